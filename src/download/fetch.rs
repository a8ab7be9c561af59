//! Concurrent page fetcher.

use futures::future::try_join_all;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::extract_extension;
use crate::{
    error::{Error, Result},
    logger::Logger,
    source::Source,
    types::{Page, PageWithImage},
};

/// Downloads `pages` concurrently, keeping their order.
///
/// The first failing page aborts the remaining downloads and its error is
/// returned alone. Cancelling `cancel` aborts every in-flight download with
/// [`Error::Cancelled`].
///
/// # Errors
///
/// [`Error::Validation`] when `pages` is empty.
#[instrument(skip_all, fields(pages = pages.len()))]
pub async fn download_pages_in_batch(
    source: &dyn Source,
    pages: &[Page],
    logger: &Logger,
    cancel: &CancellationToken,
) -> Result<Vec<PageWithImage>> {
    if pages.is_empty() {
        return Err(Error::validation("no pages provided for chapter"));
    }
    logger.log(format!("downloading {} pages", pages.len()));

    let downloads = pages.iter().enumerate().map(|(i, page)| async move {
        logger.log(format!("page #{:03}: downloading", i + 1));
        let downloaded = download_page(source, page).await?;
        logger.log(format!("page #{:03}: done", i + 1));
        Ok::<_, Error>(downloaded)
    });

    tokio::select! {
        _ = cancel.cancelled() => Err(Error::Cancelled),
        downloaded = try_join_all(downloads) => downloaded,
    }
}

/// Downloads the image of a single page.
///
/// Pages that already carry their image are returned without a request. A
/// missing extension is taken from the page URL.
pub async fn download_page(source: &dyn Source, page: &Page) -> Result<PageWithImage> {
    let mut page = page.clone();
    if page.extension.is_empty() {
        page.extension = extract_extension(&page.url)
            .map(|ext| format!(".{ext}"))
            .unwrap_or_else(|| ".jpg".to_string());
    }

    let image = match page.image.take() {
        Some(image) => image,
        None => source.get_page_image(&page).await?,
    };

    Ok(PageWithImage { page, image })
}
