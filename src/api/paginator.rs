use std::collections::VecDeque;

use futures_core::Stream;

use crate::{
    api::objects::ListObjectsRequest,
    error::{Error, Result},
    types::{ListEntry, ListObjectsPage},
};

/// Lazy walk over every entry of a listing, one request per page.
///
/// Pages are fetched strictly in order and only when the previous one is used up; the
/// walk ends after the first page that is not truncated. Entries come back in the
/// service's key order, with objects and common prefixes merged.
///
/// Under concurrent writes to the bucket the walk is only eventually consistent: keys
/// added or removed mid-walk may or may not show up.
///
/// A walk can be resumed later from [`resume_marker`](Self::resume_marker) by starting a
/// new listing with that marker.
pub struct ListObjectsPaginator {
    template: ListObjectsRequest,
    marker: Option<String>,
    resume: Option<String>,
    buffer: VecDeque<ListEntry>,
    pages_fetched: u32,
    done: bool,
}

impl ListObjectsPaginator {
    pub(crate) fn new(template: ListObjectsRequest) -> Self {
        let marker = template.starting_marker().map(str::to_string);
        Self {
            resume: marker.clone(),
            marker,
            template,
            buffer: VecDeque::new(),
            pages_fetched: 0,
            done: false,
        }
    }

    /// Returns the next entry, fetching another page when the current one is used up.
    pub async fn next_entry(&mut self) -> Result<Option<ListEntry>> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                self.resume = Some(entry.key().to_string());
                return Ok(Some(entry));
            }
            match self.fetch().await? {
                Some(page) => self.buffer.extend(page.into_entries()),
                None => return Ok(None),
            }
        }
    }

    /// Returns the next whole page.
    ///
    /// Entries still buffered from an earlier [`next_entry`](Self::next_entry) call are
    /// dropped; the resume point moves past the returned page.
    pub async fn next_page(&mut self) -> Result<Option<ListObjectsPage>> {
        self.buffer.clear();
        let page = self.fetch().await?;
        if let Some(page) = &page {
            if let Some(last) = page.entries().last() {
                self.resume = Some(last.key().to_string());
            }
        }
        Ok(page)
    }

    /// Marker from which a new listing continues right after the last entry handed out.
    pub fn resume_marker(&self) -> Option<&str> {
        self.resume.as_deref()
    }

    /// Number of list requests issued so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn is_done(&self) -> bool {
        self.done && self.buffer.is_empty()
    }

    /// Adapts the walk to a stream of entries.
    pub fn into_stream(self) -> impl Stream<Item = Result<ListEntry>> + Send {
        futures_util::stream::try_unfold(self, |mut pager| async move {
            Ok(pager.next_entry().await?.map(|entry| (entry, pager)))
        })
    }

    /// Ends the walk without fetching further pages.
    pub fn close(mut self) {
        self.done = true;
        self.buffer.clear();
        #[cfg(feature = "tracing")]
        tracing::debug!(
            pages = self.pages_fetched,
            resume = self.resume.as_deref().unwrap_or(""),
            "listing closed"
        );
    }

    async fn fetch(&mut self) -> Result<Option<ListObjectsPage>> {
        if self.done {
            return Ok(None);
        }

        let page = self
            .template
            .clone()
            .with_marker(self.marker.clone())
            .send()
            .await?;
        self.pages_fetched += 1;

        if !page.is_truncated() {
            self.done = true;
            return Ok(Some(page));
        }

        match page.next_marker() {
            Some(next) if self.marker.as_deref().is_none_or(|prev| next > prev) => {
                self.marker = Some(next.to_string());
                Ok(Some(page))
            }
            _ => {
                self.done = true;
                Err(Error::malformed(
                    "truncated listing did not advance its marker",
                    None,
                ))
            }
        }
    }
}

impl std::fmt::Debug for ListObjectsPaginator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListObjectsPaginator")
            .field("marker", &self.marker)
            .field("resume", &self.resume)
            .field("buffered", &self.buffer.len())
            .field("pages_fetched", &self.pages_fetched)
            .field("done", &self.done)
            .finish()
    }
}
