//! Image downloading with per-job unique filenames

use crate::crawler::fetcher::{FetchError, Fetcher};
use crate::storage::{FailureRecord, ImageRecord};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use url::Url;

/// Extension given to synthesized filenames
pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

/// Resolves image URLs to unique files in a job's image directory
///
/// Names are reserved in memory before the download starts so concurrent
/// downloads of two `logo.png` files never race for the same name.
#[derive(Debug)]
pub struct ImageDownloader {
    dir: PathBuf,
    downloaded: AtomicUsize,
    reserved: Mutex<HashSet<String>>,
}

impl ImageDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            downloaded: AtomicUsize::new(0),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    /// Downloads one image referenced by `page_url`
    ///
    /// Failures come back as a [`FailureRecord`] with the image category.
    pub async fn download(
        &self,
        fetcher: &Fetcher,
        image_url: &Url,
        page_url: &str,
    ) -> Result<ImageRecord, FailureRecord> {
        let filename = self.reserve(image_url);
        let dest = self.dir.join(&filename);

        match fetcher.fetch_to_file(image_url, &dest).await {
            Ok(size) => {
                self.downloaded.fetch_add(1, Ordering::SeqCst);
                tracing::debug!(url = %image_url, filename = %filename, size, "Downloaded image");
                Ok(ImageRecord {
                    url: image_url.to_string(),
                    filename,
                    page_url: page_url.to_string(),
                    size,
                })
            }
            Err(FetchError { url, kind }) => {
                self.release(&filename);
                tracing::warn!(url = %url, error = %kind, "Image download failed");
                Err(FailureRecord::image(url, kind))
            }
        }
    }

    /// Number of images successfully downloaded so far
    pub fn downloaded(&self) -> usize {
        self.downloaded.load(Ordering::SeqCst)
    }

    /// Picks and reserves a filename that exists neither on disk nor in
    /// the reservation set
    ///
    /// Synthesized names are numbered by the downloaded count.
    pub fn reserve(&self, image_url: &Url) -> String {
        let index = self.downloaded();
        let candidate = derive_filename(image_url, index);

        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        let filename = unique_filename(&candidate, |name| {
            reserved.contains(name) || self.dir.join(name).exists()
        });
        reserved.insert(filename.clone());
        filename
    }

    fn release(&self, filename: &str) {
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        reserved.remove(filename);
    }
}

/// Takes the URL path's basename, or `image_{index}.jpg` when the basename
/// is missing or has no extension
pub fn derive_filename(image_url: &Url, index: usize) -> String {
    let basename = image_url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    let name = sanitize_segment(basename);
    let usable = !name.is_empty()
        && split_extension(&name).1.len() > 1
        && !name.starts_with('.');

    if usable {
        name
    } else {
        format!("image_{}{}", index, DEFAULT_IMAGE_EXTENSION)
    }
}

/// Appends `_1`, `_2`, ... before the extension until `taken` says no
pub fn unique_filename<F>(candidate: &str, mut taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !taken(candidate) {
        return candidate.to_string();
    }

    let (stem, ext) = split_extension(candidate);
    let mut counter = 1;
    loop {
        let name = format!("{}_{}{}", stem, counter, ext);
        if !taken(&name) {
            return name;
        }
        counter += 1;
    }
}

/// Splits `name.ext` into (`name`, `.ext`); the extension is empty if absent
fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(pos) if pos > 0 => filename.split_at(pos),
        _ => (filename, ""),
    }
}

/// Keeps a path segment safe to use as a filename
fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}
