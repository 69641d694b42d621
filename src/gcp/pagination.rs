//! Pagination
//!
//! List methods return one page at a time together with a `nextPageToken`.
//! Three ways to consume them are provided:
//!
//! - [`Page`]: one page plus the request for the next one, for caller-driven
//!   continuation
//! - [`items`]: a lazy [`Stream`] of items that fetches pages on demand
//! - [`spawn_items`]: a producer task feeding a channel; dropping the
//!   receiver stops page fetches
//!
//! A stream is not restartable; build a new one from the original request to
//! start over.

use super::error::{Error, Result};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use std::future::Future;
use tokio::sync::mpsc;

/// A list request that carries a page token
pub trait PagedRequest: Clone {
    fn page_token(&self) -> &str;
    fn set_page_token(&mut self, token: String);
}

/// A list response holding one page of results
pub trait PagedResponse {
    type Item;

    fn next_page_token(&self) -> &str;
    fn into_items(self) -> Vec<Self::Item>;
}

/// One page of results and the request that fetches the next page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<Req, T> {
    pub items: Vec<T>,
    /// `None` when the server returned no continuation token
    pub next_request: Option<Req>,
}

impl<Req: PagedRequest, T> Page<Req, T> {
    /// Build a page from a response to `request`
    pub fn from_response<Resp>(request: &Req, response: Resp) -> Self
    where
        Resp: PagedResponse<Item = T>,
    {
        let next_request = next_request(request, response.next_page_token());
        Self {
            items: response.into_items(),
            next_request,
        }
    }

    pub fn has_next(&self) -> bool {
        self.next_request.is_some()
    }
}

/// The follow-up request: identical to `request` except for its page token
pub fn next_request<Req: PagedRequest>(request: &Req, next_page_token: &str) -> Option<Req> {
    if next_page_token.is_empty() {
        return None;
    }
    let mut next = request.clone();
    next.set_page_token(next_page_token.to_string());
    Some(next)
}

/// Lazily stream every item, fetching pages with `fetch` as they are needed
pub fn items<Req, T, F, Fut>(request: Req, mut fetch: F) -> impl Stream<Item = Result<T>>
where
    Req: PagedRequest,
    F: FnMut(Req) -> Fut,
    Fut: Future<Output = Result<Page<Req, T>>>,
{
    stream::try_unfold(Some(request), move |pending| {
        let page = pending.map(&mut fetch);
        async move {
            let Some(page) = page else {
                return Ok::<_, Error>(None);
            };
            let page = page.await?;
            let items = stream::iter(page.items.into_iter().map(Ok::<T, Error>));
            Ok(Some((items, page.next_request)))
        }
    })
    .try_flatten()
}

/// Drain a paged listing into a single ordered vector
pub async fn collect_all<T, S>(items: S) -> Result<Vec<T>>
where
    S: Stream<Item = Result<T>>,
{
    items.try_collect().await
}

/// Drive `items` on a background task, delivering through a bounded channel.
///
/// Dropping the receiver cancels any in-flight page request and stops
/// further fetches. The first error is delivered and ends the stream.
pub fn spawn_items<T>(mut items: BoxStream<'static, Result<T>>, buffer: usize) -> mpsc::Receiver<Result<T>>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    tracing::debug!("Listing receiver dropped, stopping page fetches");
                    break;
                }
                next = items.next() => next,
            };

            let Some(item) = next else {
                break;
            };
            let failed = item.is_err();
            if tx.send(item).await.is_err() || failed {
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::status::{Code, Status};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Request {
        filter: String,
        token: String,
    }

    impl PagedRequest for Request {
        fn page_token(&self) -> &str {
            &self.token
        }

        fn set_page_token(&mut self, token: String) {
            self.token = token;
        }
    }

    struct Response {
        items: Vec<u32>,
        next: String,
    }

    impl PagedResponse for Response {
        type Item = u32;

        fn next_page_token(&self) -> &str {
            &self.next
        }

        fn into_items(self) -> Vec<u32> {
            self.items
        }
    }

    /// Serves `pages`, using the page index as the token
    fn server(pages: Vec<Vec<u32>>, calls: Arc<AtomicUsize>) -> impl FnMut(Request) -> futures::future::Ready<Result<Page<Request, u32>>> {
        move |request: Request| {
            calls.fetch_add(1, Ordering::SeqCst);
            let index: usize = request.token.parse().unwrap_or(0);
            let next = if index + 1 < pages.len() {
                (index + 1).to_string()
            } else {
                String::new()
            };
            let response = Response {
                items: pages[index].clone(),
                next,
            };
            futures::future::ready(Ok(Page::from_response(&request, response)))
        }
    }

    #[test]
    fn test_next_request_only_changes_token() {
        let request = Request {
            filter: "gateways".into(),
            token: String::new(),
        };
        assert_eq!(next_request(&request, ""), None);

        let next = next_request(&request, "abc").unwrap();
        assert_eq!(next.filter, "gateways");
        assert_eq!(next.page_token(), "abc");
    }

    #[tokio::test]
    async fn test_items_concatenate_pages_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pages = vec![vec![1, 2], vec![], vec![3], vec![4, 5, 6]];
        let all = collect_all(items(Request::default(), server(pages, calls.clone())))
            .await
            .unwrap();

        assert_eq!(all, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_items_are_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pages = vec![vec![1, 2], vec![3, 4]];
        let stream = items(Request::default(), server(pages, calls.clone()));
        futures::pin_mut!(stream);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_ends_stream() {
        let mut served = 0;
        let fetch = move |request: Request| {
            served += 1;
            let result: Result<Page<Request, u32>> = if served == 1 {
                Ok(Page {
                    items: vec![1],
                    next_request: next_request(&request, "more"),
                })
            } else {
                Err(Status::new(Code::Unavailable, "gone").into())
            };
            futures::future::ready(result)
        };

        let results: Vec<Result<u32>> = items(Request::default(), fetch).collect().await;
        assert_eq!(results.len(), 2);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert_eq!(results[1].as_ref().unwrap_err().code(), Code::Unavailable);
    }

    #[tokio::test]
    async fn test_spawned_items_are_delivered() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pages = vec![vec![1], vec![2, 3]];
        let mut rx = spawn_items(items(Request::default(), server(pages, calls)).boxed(), 1);

        let mut received = Vec::new();
        while let Some(item) = rx.recv().await {
            received.push(item.unwrap());
        }
        assert_eq!(received, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dropping_receiver_stops_fetching() {
        let calls = Arc::new(AtomicUsize::new(0));
        let pages: Vec<Vec<u32>> = (0..100).map(|i| vec![i]).collect();
        let mut rx = spawn_items(items(Request::default(), server(pages, calls.clone())).boxed(), 1);

        assert_eq!(rx.recv().await.unwrap().unwrap(), 0);
        drop(rx);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert!(calls.load(Ordering::SeqCst) < 100);
    }
}
