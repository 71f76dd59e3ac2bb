use crate::error::RecommendError;
use crate::shelf::Shelf;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const SUGGESTION_LIMIT: usize = 5;
const PURCHASE_SUGGESTION_LIMIT: usize = 3;
const INDEX_HTML: &str = "<!doctype html><html><head><title>bookrec</title></head><body>\
<h1>bookrec</h1><ul>\
<li><code>GET /recommend/book?title=..&amp;top_n=..</code></li>\
<li><code>GET /recommend/interests?q=..&amp;top_n=..</code></li>\
<li><code>GET /books</code></li>\
<li><code>GET /titles?q=..</code></li>\
<li><code>GET /buy?q=..</code></li>\
</ul></body></html>";

#[derive(Deserialize)]
struct BookQuery {
    #[serde(default)]
    title: String,
    top_n: Option<usize>,
}

#[derive(Deserialize)]
struct InterestQuery {
    #[serde(default)]
    q: String,
    top_n: Option<usize>,
}

#[derive(Deserialize)]
struct TitleQuery {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

/// Every HTTP route, sharing one immutable shelf.
pub fn routes(
    shelf: Arc<Shelf>,
    default_top_n: usize,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let index_route = warp::path::end().and(warp::get()).and_then(index);

    let book_route = warp::path!("recommend" / "book")
        .and(warp::get())
        .and(warp::query::<BookQuery>())
        .and(with_shelf(Arc::clone(&shelf)))
        .and(warp::any().map(move || default_top_n))
        .and_then(handle_book);

    let interests_route = warp::path!("recommend" / "interests")
        .and(warp::get())
        .and(warp::query::<InterestQuery>())
        .and(with_shelf(Arc::clone(&shelf)))
        .and(warp::any().map(move || default_top_n))
        .and_then(handle_interests);

    let titles_route = warp::path!("titles")
        .and(warp::get())
        .and(warp::query::<TitleQuery>())
        .and(with_shelf(Arc::clone(&shelf)))
        .and_then(handle_titles);

    let buy_route = warp::path!("buy")
        .and(warp::get())
        .and(warp::query::<TitleQuery>())
        .and(with_shelf(Arc::clone(&shelf)))
        .and_then(handle_buy);

    let books_route = warp::path!("books")
        .and(warp::get())
        .and(with_shelf(shelf))
        .and_then(handle_books);

    index_route
        .or(book_route)
        .or(interests_route)
        .or(titles_route)
        .or(buy_route)
        .or(books_route)
}

fn with_shelf(
    shelf: Arc<Shelf>,
) -> impl Filter<Extract = (Arc<Shelf>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&shelf))
}

async fn index() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::html(INDEX_HTML))
}

async fn handle_book(
    query: BookQuery,
    shelf: Arc<Shelf>,
    default_top_n: usize,
) -> Result<impl Reply, Rejection> {
    info!("get book request: {:?}", query.title);
    let top_n = query.top_n.unwrap_or(default_top_n);
    match shelf.by_book(&query.title, top_n) {
        Ok(cards) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "title": query.title, "results": cards })),
            StatusCode::OK,
        )),
        Err(RecommendError::BookNotFound(title)) => {
            info!("book not found: {}", title);
            let suggestions = shelf.suggest_titles(&title, SUGGESTION_LIMIT);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({
                    "error": format!("book not found: {}", title),
                    "suggestions": suggestions,
                    "hint": "try /recommend/interests?q=<what you like>",
                })),
                StatusCode::NOT_FOUND,
            ))
        }
        Err(e) => Ok(error_reply(e)),
    }
}

async fn handle_interests(
    query: InterestQuery,
    shelf: Arc<Shelf>,
    default_top_n: usize,
) -> Result<impl Reply, Rejection> {
    info!("get interests request: {:?}", query.q);
    let top_n = query.top_n.unwrap_or(default_top_n);
    match shelf.by_interests(&query.q, top_n) {
        Ok(cards) => Ok(warp::reply::with_status(
            warp::reply::json(&json!({ "query": query.q, "results": cards })),
            StatusCode::OK,
        )),
        Err(e) => Ok(error_reply(e)),
    }
}

async fn handle_titles(query: TitleQuery, shelf: Arc<Shelf>) -> Result<impl Reply, Rejection> {
    let limit = query.limit.unwrap_or(SUGGESTION_LIMIT);
    let titles = shelf.suggest_titles(&query.q, limit);
    debug!("titles for {:?}: {}", query.q, titles.len());
    Ok(warp::reply::json(&titles))
}

async fn handle_buy(query: TitleQuery, shelf: Arc<Shelf>) -> Result<impl Reply, Rejection> {
    info!("get buy request: {:?}", query.q);
    match shelf.find_for_purchase(&query.q) {
        Ok(card) => Ok(warp::reply::with_status(
            warp::reply::json(&card),
            StatusCode::OK,
        )),
        Err(RecommendError::BookNotFound(q)) => {
            let limit = query.limit.unwrap_or(PURCHASE_SUGGESTION_LIMIT);
            let suggestions = shelf.purchase_suggestions(&q, limit);
            Ok(warp::reply::with_status(
                warp::reply::json(&json!({
                    "error": format!("book not found: {}", q),
                    "suggestions": suggestions,
                })),
                StatusCode::NOT_FOUND,
            ))
        }
        Err(e) => Ok(error_reply(e)),
    }
}

async fn handle_books(shelf: Arc<Shelf>) -> Result<impl Reply, Rejection> {
    let cards = shelf.all_books();
    info!("get books request return: {} books", cards.len());
    Ok(warp::reply::json(&cards))
}

/// Caller mistakes answer 400, anything else is a 500.
pub fn error_reply(e: RecommendError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = if e.is_recoverable() {
        StatusCode::BAD_REQUEST
    } else {
        error!("request failed: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    };
    warp::reply::with_status(
        warp::reply::json(&json!({ "error": e.to_string() })),
        status,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_follows_recoverability() {
        let status = |e| error_reply(e).into_response().status();
        assert_eq!(status(RecommendError::EmptyQuery), StatusCode::BAD_REQUEST);
        assert_eq!(status(RecommendError::InvalidTopN(0)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(RecommendError::BookNotFound("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(RecommendError::Corruption("bad matrix".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(status(RecommendError::EmptyCorpus), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
