//! Choosing which article a run writes about.

use rand::Rng;
use tracing::{info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::links::canonical::{DEFAULT_TITLE, canonical_article_url, title_from_url};
use crate::models::CanonicalLink;
use crate::scrapers::ScrapeService;
use crate::scrapers::hackernews::{HARVEST_LIMIT, index_articles};

/// Leading homepage links a random pick is drawn from.
pub const SHORTLIST_SIZE: usize = 4;

/// Pick the article for one run.
///
/// An explicit `url` must be a valid article permalink; it is never replaced
/// by a harvested one. Without it the homepage is harvested and the pick is
/// made from the first [`SHORTLIST_SIZE`] links, by `index` when it is in
/// range and at random otherwise.
#[instrument(level = "info", skip(scraper))]
pub async fn select_article<S: ScrapeService>(
    scraper: &S,
    url: Option<&str>,
    index: Option<i64>,
) -> Result<CanonicalLink> {
    if let Some(raw) = url {
        let url = canonical_article_url(raw).ok_or_else(|| {
            PipelineError::Validation(format!(
                "Provided URL is not a valid Hacker News article: {raw}"
            ))
        })?;
        let title = title_from_url(&url, DEFAULT_TITLE);
        info!(%url, "Using explicitly requested article");
        return Ok(CanonicalLink { title, url });
    }

    let harvested = index_articles(scraper, HARVEST_LIMIT).await?;
    let shortlist: Vec<CanonicalLink> = harvested.into_iter().take(SHORTLIST_SIZE).collect();
    let picked = pick_from_shortlist(&shortlist, index, &mut rand::rng())?;
    info!(url = %picked.url, title = %picked.title, shortlisted = shortlist.len(), "Selected article");
    Ok(picked)
}

/// Pick `index` from `shortlist` when it is in range, otherwise a uniform random entry.
pub fn pick_from_shortlist<R: Rng>(
    shortlist: &[CanonicalLink],
    index: Option<i64>,
    rng: &mut R,
) -> Result<CanonicalLink> {
    if shortlist.is_empty() {
        return Err(PipelineError::Validation(
            "No Hacker News articles available to select".to_string(),
        ));
    }

    let in_range = index
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < shortlist.len());
    let position = match (index, in_range) {
        (_, Some(i)) => i,
        (Some(requested), None) => {
            warn!(requested, available = shortlist.len(), "Index out of range; picking at random");
            rng.random_range(0..shortlist.len())
        }
        (None, None) => rng.random_range(0..shortlist.len()),
    };
    Ok(shortlist[position].clone())
}
