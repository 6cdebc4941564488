use std::convert::Infallible;

use super::{AnalyseRequest, ErrorResponse};
use crate::{
    analyser::{Analyser, Prober},
    downloader::Downloader,
};
use tracing::{info, warn};
use warp::http::StatusCode;

fn error_reply(error: String, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&ErrorResponse { error }), status)
}

/// Handle an analyse request.
/// Fetch the page at the requested URL and respond with its report.
/// Respond with `500 Internal Server Error` if the page cannot be fetched or is not parseable HTML.
pub(super) async fn analyse(
    request: AnalyseRequest,
    downloader: Downloader,
    prober: Prober,
) -> Result<impl warp::Reply, Infallible> {
    let url = request.url;
    info!("Received URL from client: {}", url);

    let document = match downloader.download(&url).await {
        Ok(document) => document,
        Err(e) => {
            warn!("Failed GET request to URL: {}. Got error: {}", url, e);
            return Ok(error_reply(
                format!("Failed to retrieve data from request to url: {}", url),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };
    info!("Received response from: {}", url);

    let report = match Analyser::new(document, url.clone(), prober).analyse().await {
        Ok(report) => report,
        Err(e) => {
            warn!("Analysis of {} failed: {}", url, e);
            return Ok(error_reply(
                format!("Received unparseable HTML from URL: {}", url),
                StatusCode::INTERNAL_SERVER_ERROR,
            ));
        }
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&report),
        StatusCode::OK,
    ))
}
