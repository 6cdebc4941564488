use std::{convert::Infallible, path::PathBuf};

use warp::Filter;

use super::handlers;
use crate::{analyser::Prober, downloader::Downloader};

fn with_state<T>(state: T) -> impl Filter<Extract = (T,), Error = Infallible> + Clone
where
    T: Clone + Send + Sync,
{
    warp::any().map(move || state.clone())
}

/// POST /analyseUrl with JSON body
pub(super) fn analyse(
    downloader: Downloader,
    prober: Prober,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("analyseUrl")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(4096))
        .and(warp::body::json())
        .and(with_state(downloader))
        .and(with_state(prober))
        .and_then(handlers::analyse)
}

/// GET /
pub(super) fn index(
    static_dir: PathBuf,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path::end()
        .and(warp::get())
        .and(warp::fs::file(static_dir.join("app.html")))
}

/// GET /public/<file>
pub(super) fn public(
    static_dir: PathBuf,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("public").and(warp::get()).and(warp::fs::dir(static_dir))
}
