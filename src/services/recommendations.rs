use crate::{
    error::AppResult,
    models::{Interaction, MovieRecord, ScoredMovie},
    services::{
        accounts::authenticate,
        catalog::{load_index, CatalogIndex},
        providers::{IdentityProvider, RecommendationModel, RecordStore},
    },
};

/// Generates personalized movie recommendations
///
/// The caller's full rating history goes to the model as interaction pairs.
/// The ranked ids that come back are resolved against the catalog in the
/// model's order. The model call and the catalog fetch run concurrently.
pub async fn recommend_for_user(
    store: &dyn RecordStore,
    identity: &dyn IdentityProvider,
    model: &dyn RecommendationModel,
    token: Option<&str>,
    count: usize,
) -> AppResult<Vec<MovieRecord>> {
    let user = authenticate(identity, token).await?;
    let history = store.ratings_for_user(&user.local_id).await?;
    let interactions: Vec<Interaction> = history.iter().map(Interaction::from).collect();

    let (ranked, catalog) = tokio::try_join!(
        model.recommend(&interactions, count),
        load_index(store)
    )?;

    let movies = join_ranked(&ranked, &catalog);

    tracing::info!(
        user_id = %user.local_id,
        interactions = interactions.len(),
        ranked = ranked.len(),
        resolved = movies.len(),
        "Recommendations resolved"
    );

    Ok(movies)
}

/// Resolves ranked ids to catalog records, keeping rank order.
pub fn join_ranked(ranked: &[ScoredMovie], catalog: &CatalogIndex) -> Vec<MovieRecord> {
    ranked
        .iter()
        .filter_map(|scored| {
            let movie = catalog.get(scored.movie_id);
            if movie.is_none() {
                tracing::warn!(
                    movie_id = scored.movie_id,
                    "Recommended movie missing from catalog"
                );
            }
            movie.cloned()
        })
        .collect()
}
