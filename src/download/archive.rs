//! Serializers for the archive formats.
//!
//! Every writer takes the pages in reading order and returns the encoded
//! archive. Pages are named `0001.png`, `0002.jpg` and so on. The writers
//! are blocking and run on the blocking pool during downloads.

use flate2::{Compression, write::GzEncoder, write::ZlibEncoder};
use image::{DynamicImage, ImageFormat};
use lopdf::{
    Dictionary, Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};
use std::io::{Cursor, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use zip::{CompressionMethod, ZipWriter, write::SimpleFileOptions};

use crate::{error::Result, metadata::FILENAME_COMIC_INFO_XML, types::PageWithImage};

/// Name of the page at zero-based `index` inside an archive.
pub fn page_name(index: usize, page: &PageWithImage) -> String {
    format!("{:04}{}", index + 1, page.extension())
}

/// Pages as a TAR archive, entries written with `mode`.
pub fn write_tar(pages: &[PageWithImage], mode: u32) -> Result<Vec<u8>> {
    append_tar(Vec::new(), pages, mode)
}

/// Pages as a gzip-compressed TAR archive.
pub fn write_tar_gz(pages: &[PageWithImage], mode: u32) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    Ok(append_tar(encoder, pages, mode)?.finish()?)
}

fn append_tar<W: Write>(out: W, pages: &[PageWithImage], mode: u32) -> Result<W> {
    let mtime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    let mut builder = tar::Builder::new(out);
    for (i, page) in pages.iter().enumerate() {
        let mut header = tar::Header::new_gnu();
        header.set_size(page.image.len() as u64);
        header.set_mode(mode);
        header.set_mtime(mtime);
        header.set_entry_type(tar::EntryType::Regular);
        builder.append_data(&mut header, page_name(i, page), page.image.as_ref())?;
    }
    Ok(builder.into_inner()?)
}

/// Pages as a ZIP archive with stored entries.
pub fn write_zip(pages: &[PageWithImage]) -> Result<Vec<u8>> {
    write_cbz(pages, None)
}

/// Pages as a CBZ archive, followed by a `ComicInfo.xml` entry when given.
pub fn write_cbz(pages: &[PageWithImage], comic_info_xml: Option<&str>) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for (i, page) in pages.iter().enumerate() {
        zip.start_file(page_name(i, page), options)?;
        zip.write_all(&page.image)?;
    }

    if let Some(xml) = comic_info_xml {
        zip.start_file(FILENAME_COMIC_INFO_XML, options)?;
        zip.write_all(xml.as_bytes())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Pages as an image-only PDF, one page per image sized to the image.
///
/// JPEG pages are embedded as they are; other formats are decoded and
/// stored as deflated RGB.
pub fn write_pdf(pages: &[PageWithImage]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::with_capacity(pages.len());

    for page in pages {
        let decoded = image::load_from_memory(&page.image)?;
        let (width, height) = (i64::from(decoded.width()), i64::from(decoded.height()));
        let image_id = doc.add_object(image_xobject(&page.image, &decoded, width, height)?);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                        height.into(),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![Object::Integer(0), Object::Integer(0), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn image_xobject(raw: &[u8], decoded: &DynamicImage, width: i64, height: i64) -> Result<Stream> {
    let gray = decoded.color().channel_count() == 1;

    let (filter, color_space, data) = if image::guess_format(raw)? == ImageFormat::Jpeg {
        let color_space = if gray { "DeviceGray" } else { "DeviceRGB" };
        ("DCTDecode", color_space, raw.to_vec())
    } else {
        let (color_space, pixels) = if gray {
            ("DeviceGray", decoded.to_luma8().into_raw())
        } else {
            ("DeviceRGB", decoded.to_rgb8().into_raw())
        };
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&pixels)?;
        ("FlateDecode", color_space, encoder.finish()?)
    };

    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width,
            "Height" => height,
            "ColorSpace" => color_space,
            "BitsPerComponent" => 8_i64,
            "Filter" => filter,
        },
        data,
    );
    stream.allows_compression = false;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Page;
    use bytes::Bytes;
    use std::io::Read;

    fn png(shade: u8) -> Bytes {
        let image = image::RgbImage::from_pixel(3, 2, image::Rgb([shade, shade, shade]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    fn pages(count: u8) -> Vec<PageWithImage> {
        (0..count)
            .map(|i| PageWithImage {
                page: Page::new(format!("https://example.com/{i}.png"), ".png"),
                image: png(i * 10),
            })
            .collect()
    }

    #[test]
    fn test_tar_entries_keep_order_and_mode() {
        let pages = pages(3);
        let data = write_tar(&pages, 0o640).unwrap();

        let mut archive = tar::Archive::new(Cursor::new(data));
        let entries: Vec<(String, u32, Vec<u8>)> = archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let name = entry.path().unwrap().display().to_string();
                let mode = entry.header().mode().unwrap();
                let mut body = Vec::new();
                entry.read_to_end(&mut body).unwrap();
                (name, mode, body)
            })
            .collect();

        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].0, "0001.png");
        assert_eq!(entries[2].0, "0003.png");
        assert_eq!(entries[1].1, 0o640);
        assert_eq!(entries[1].2, pages[1].image.to_vec());
    }

    #[test]
    fn test_tar_gz_is_gzip_wrapped_tar() {
        let data = write_tar_gz(&pages(2), 0o644).unwrap();
        assert_eq!(&data[..2], &[0x1f, 0x8b]);

        let decoder = flate2::read::GzDecoder::new(Cursor::new(data));
        let mut archive = tar::Archive::new(decoder);
        assert_eq!(archive.entries().unwrap().count(), 2);
    }

    #[test]
    fn test_cbz_appends_comic_info() {
        let data = write_cbz(&pages(2), Some("<ComicInfo></ComicInfo>")).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();

        let names: Vec<_> = archive.file_names().map(str::to_string).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(archive.by_index(0).unwrap().name(), "0001.png");
        assert_eq!(archive.by_index(2).unwrap().name(), FILENAME_COMIC_INFO_XML);
        assert_eq!(
            archive.by_index(0).unwrap().compression(),
            CompressionMethod::Stored
        );
    }

    #[test]
    fn test_zip_has_no_comic_info() {
        let data = write_zip(&pages(2)).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[test]
    fn test_pdf_has_one_page_per_image() {
        let data = write_pdf(&pages(3)).unwrap();
        assert!(data.starts_with(b"%PDF-"));

        let doc = Document::load_mem(&data).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_pdf_rejects_non_images() {
        let page = PageWithImage {
            page: Page::new("https://example.com/1.png", ".png"),
            image: Bytes::from_static(b"not an image"),
        };
        assert!(write_pdf(&[page]).is_err());
    }
}
