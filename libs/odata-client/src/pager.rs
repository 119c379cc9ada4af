//! Skip/skiptoken pagination with Stream API
//!
//! A pager turns a page-fetching function into a `Stream` of pages or items.
//! Pages are requested strictly one after another: the cursor for page N+1 is
//! only known once page N has arrived. Dropping the stream cancels it, no
//! further request is issued.
//!
//! # Example
//!
//! ```rust,ignore
//! use futures_util::StreamExt;
//!
//! let mut people = client.entity_set::<Person>("People", "TripPin.Person").top(50).all();
//! while let Some(person) = people.next().await {
//!     println!("{:?}", person?);
//! }
//! ```

use futures_core::Stream;
use pin_project_lite::pin_project;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::annotations::Entities;
use crate::error::Error;

/// Continuation cursor taken from a page's `@odata.nextLink`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    pub position: Continuation,
    /// Page size carried by the next link; replaces the caller's `$top`.
    pub top: Option<u64>,
}

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    Skip(u64),
    SkipToken(String),
}

impl PageCursor {
    #[must_use]
    pub fn skip(skip: u64) -> Self {
        Self {
            position: Continuation::Skip(skip),
            top: None,
        }
    }

    #[must_use]
    pub fn skiptoken(token: impl Into<String>) -> Self {
        Self {
            position: Continuation::SkipToken(token.into()),
            top: None,
        }
    }

    #[must_use]
    pub fn with_top(mut self, top: Option<u64>) -> Self {
        self.top = top;
        self
    }
}

/// Boxed future for page fetchers.
pub type BoxedPageFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<Entities<T>, Error>> + Send + 'a>>;

/// Boxed fetcher (accepts the cursor of the page to load, `None` for the first).
pub type BoxedPageFetcher<'a, T> =
    Box<dyn FnMut(Option<PageCursor>) -> BoxedPageFuture<'a, T> + Send + 'a>;

/// Named item stream returned by the resource `all()` helpers.
pub type ItemsStream<'a, T> = ItemsPager<T, Error, BoxedPageFetcher<'a, T>, BoxedPageFuture<'a, T>>;

/// Named page stream returned by the resource `pages()` helpers.
pub type PagesStream<'a, T> = PagesPager<T, Error, BoxedPageFetcher<'a, T>, BoxedPageFuture<'a, T>>;

pin_project! {
    /// Yields every entity of every page, in arrival order.
    ///
    /// A fetch error is yielded once and ends the stream.
    pub struct ItemsPager<T, E, F, Fut>
    where
        F: FnMut(Option<PageCursor>) -> Fut,
        Fut: Future<Output = Result<Entities<T>, E>>,
    {
        next_cursor: Option<PageCursor>,
        buffer: VecDeque<T>,
        pages: usize,
        done: bool,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> ItemsPager<T, E, F, Fut>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Entities<T>, E>>,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            next_cursor: None,
            buffer: VecDeque::new(),
            pages: 0,
            done: false,
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for ItemsPager<T, E, F, Fut>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Entities<T>, E>>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if let Some(item) = this.buffer.pop_front() {
                return Poll::Ready(Some(Ok(item)));
            }

            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        *this.pages += 1;

                        *this.next_cursor = page.meta.next_cursor();
                        if this.next_cursor.is_none() {
                            *this.done = true;
                        }
                        tracing::debug!(
                            page = *this.pages,
                            items = page.entities.len(),
                            next = ?this.next_cursor,
                            "received page"
                        );

                        this.buffer.extend(page.entities);
                        continue;
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            tracing::trace!(cursor = ?this.next_cursor, "fetching page");
            let fut = (this.fetcher)(this.next_cursor.take());
            this.current_fetch.set(Some(fut));
        }
    }
}

pin_project! {
    /// Yields whole pages, each with its annotations.
    pub struct PagesPager<T, E, F, Fut>
    where
        F: FnMut(Option<PageCursor>) -> Fut,
        Fut: Future<Output = Result<Entities<T>, E>>,
    {
        next_cursor: Option<PageCursor>,
        pages: usize,
        done: bool,
        fetcher: F,
        #[pin]
        current_fetch: Option<Fut>,
    }
}

impl<T, E, F, Fut> PagesPager<T, E, F, Fut>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Entities<T>, E>>,
{
    pub fn new(fetcher: F) -> Self {
        Self {
            next_cursor: None,
            pages: 0,
            done: false,
            fetcher,
            current_fetch: None,
        }
    }
}

impl<T, E, F, Fut> Stream for PagesPager<T, E, F, Fut>
where
    F: FnMut(Option<PageCursor>) -> Fut,
    Fut: Future<Output = Result<Entities<T>, E>>,
{
    type Item = Result<Entities<T>, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        loop {
            if *this.done {
                return Poll::Ready(None);
            }

            if let Some(fut) = this.current_fetch.as_mut().as_pin_mut() {
                match fut.poll(cx) {
                    Poll::Ready(Ok(page)) => {
                        this.current_fetch.set(None);
                        *this.pages += 1;

                        *this.next_cursor = page.meta.next_cursor();
                        if this.next_cursor.is_none() {
                            *this.done = true;
                        }
                        tracing::debug!(
                            page = *this.pages,
                            items = page.entities.len(),
                            next = ?this.next_cursor,
                            "received page"
                        );

                        return Poll::Ready(Some(Ok(page)));
                    }
                    Poll::Ready(Err(e)) => {
                        this.current_fetch.set(None);
                        *this.done = true;
                        return Poll::Ready(Some(Err(e)));
                    }
                    Poll::Pending => return Poll::Pending,
                }
            }

            tracing::trace!(cursor = ?this.next_cursor, "fetching page");
            let fut = (this.fetcher)(this.next_cursor.take());
            this.current_fetch.set(Some(fut));
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::annotations::EntitiesAnnotations;
    use futures_util::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(items: Vec<u32>, skip: Option<u64>, skiptoken: Option<&str>) -> Entities<u32> {
        Entities {
            entities: items,
            meta: EntitiesAnnotations {
                skip,
                skiptoken: skiptoken.map(str::to_owned),
                ..EntitiesAnnotations::default()
            },
        }
    }

    #[tokio::test]
    async fn items_follow_skip_cursor() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = seen.clone();
        let pager = ItemsPager::new(move |cursor: Option<PageCursor>| {
            log.lock().push(cursor.clone());
            async move {
                Ok::<_, String>(match cursor {
                    None => page(vec![1, 2], Some(2), None),
                    Some(c) if c == PageCursor::skip(2) => page(vec![3, 4], Some(4), None),
                    _ => page(vec![5], None, None),
                })
            }
        });

        let items: Vec<u32> = pager.map(Result::unwrap).collect().await;
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
        assert_eq!(
            *seen.lock(),
            vec![None, Some(PageCursor::skip(2)), Some(PageCursor::skip(4))]
        );
    }

    #[tokio::test]
    async fn skiptoken_wins_over_skip() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let log = seen.clone();
        let pager = PagesPager::new(move |cursor: Option<PageCursor>| {
            log.lock().push(cursor.clone());
            async move {
                Ok::<_, String>(match cursor {
                    None => page(vec![1], Some(1), Some("t1")),
                    _ => page(vec![2], None, None),
                })
            }
        });

        let pages: Vec<_> = pager.collect().await;
        assert_eq!(pages.len(), 2);
        assert_eq!(seen.lock()[1], Some(PageCursor::skiptoken("t1")));
    }

    #[tokio::test]
    async fn error_is_yielded_once_then_stream_ends() {
        let pager = ItemsPager::new(|cursor: Option<PageCursor>| async move {
            match cursor {
                None => Ok(page(vec![1], Some(1), None)),
                _ => Err("boom".to_owned()),
            }
        });

        let results: Vec<Result<u32, String>> = pager.collect().await;
        assert_eq!(results, vec![Ok(1), Err("boom".to_owned())]);
    }

    #[tokio::test]
    async fn dropping_the_stream_stops_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let pager = ItemsPager::new(move |cursor: Option<PageCursor>| {
            counter.fetch_add(1, Ordering::SeqCst);
            let next = match cursor.map(|c| c.position) {
                None => 2,
                Some(Continuation::Skip(n)) => n + 2,
                Some(Continuation::SkipToken(_)) => 0,
            };
            async move { Ok::<_, String>(page(vec![1, 2], Some(next), None)) }
        });

        let first: Vec<_> = pager.take(3).collect().await;
        assert_eq!(first.len(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
