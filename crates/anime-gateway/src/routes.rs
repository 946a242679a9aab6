//! The gateway's route table.

use crate::catalog::{Endpoint, SharedSource};
use crate::dispatch::pattern::PatternError;
use crate::dispatch::{handler, Handler, Reply, RequestContext, RouteTable};
use crate::proxy::StreamProxy;

/// Listing categories served at `/api/<category>`.
pub const CATEGORIES: &[&str] = &[
    "top-airing",
    "most-popular",
    "most-favorite",
    "completed",
    "recently-added",
    "recently-updated",
    "top-upcoming",
    "subbed-anime",
    "dubbed-anime",
    "movie",
    "tv",
    "ova",
    "ona",
    "special",
    "events",
    "genre/action",
    "genre/adventure",
    "genre/cars",
    "genre/comedy",
    "genre/dementia",
    "genre/demons",
    "genre/drama",
    "genre/ecchi",
    "genre/fantasy",
    "genre/game",
    "genre/harem",
    "genre/historical",
    "genre/horror",
    "genre/isekai",
    "genre/josei",
    "genre/kids",
    "genre/magic",
    "genre/martial-arts",
    "genre/mecha",
    "genre/military",
    "genre/music",
    "genre/mystery",
    "genre/parody",
    "genre/police",
    "genre/psychological",
    "genre/romance",
    "genre/samurai",
    "genre/school",
    "genre/sci-fi",
    "genre/seinen",
    "genre/shoujo",
    "genre/shoujo-ai",
    "genre/shounen",
    "genre/shounen-ai",
    "genre/slice-of-life",
    "genre/space",
    "genre/sports",
    "genre/super-power",
    "genre/supernatural",
    "genre/thriller",
    "genre/vampire",
];

/// A handler that asks `source` for `endpoint` and hands back the value.
fn content(source: &SharedSource, endpoint: Endpoint) -> Handler {
    let source = source.clone();
    handler(move |ctx: RequestContext| {
        let source = source.clone();
        let endpoint = endpoint.clone();
        async move {
            let value = source.fetch(&endpoint, &ctx).await?;
            Ok(Reply::Data(value))
        }
    })
}

/// Build the full route table: the streaming proxy, then every domain
/// endpoint in registration order.
pub fn api_routes(source: SharedSource, proxy: StreamProxy) -> Result<RouteTable, PatternError> {
    let mut table = RouteTable::builder()
        .route("/api/proxy", proxy.into_handler())?
        .route("/api", content(&source, Endpoint::Home))?;

    for category in CATEGORIES {
        table = table.route(
            &format!("/api/{category}"),
            content(&source, Endpoint::Category(category.to_string())),
        )?;
    }

    let table = table
        .route("/api/top-ten", content(&source, Endpoint::TopTen))?
        .route("/api/info", content(&source, Endpoint::Info))?
        .route("/api/episodes/:id", content(&source, Endpoint::Episodes))?
        .route("/api/servers/:id", content(&source, Endpoint::Servers))?
        .route("/api/stream", content(&source, Endpoint::Stream { fallback: false }))?
        .route("/api/stream/fallback", content(&source, Endpoint::Stream { fallback: true }))?
        .route("/api/search", content(&source, Endpoint::Search))?
        .route("/api/filter", content(&source, Endpoint::Filter))?
        .route("/api/search/suggest", content(&source, Endpoint::SearchSuggest))?
        .route("/api/schedule", content(&source, Endpoint::Schedule))?
        .route("/api/schedule/:id", content(&source, Endpoint::NextEpisodeSchedule))?
        .route("/api/random", content(&source, Endpoint::Random))?
        .route("/api/random/id", content(&source, Endpoint::RandomId))?
        .route("/api/qtip/:id", content(&source, Endpoint::Qtip))?
        .route("/api/producer/:id", content(&source, Endpoint::Producer))?
        .route("/api/character/list/:id", content(&source, Endpoint::CharacterList))?
        .route("/api/watchlist/:userId/:page?", content(&source, Endpoint::Watchlist))?
        .route("/api/actors/:id", content(&source, Endpoint::Actors))?
        .route("/api/character/:id", content(&source, Endpoint::Character))?
        .route("/api/top-search", content(&source, Endpoint::TopSearch))?;

    Ok(table.build())
}
