use serde::Deserialize;
use utoipa::IntoParams;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub(crate) struct SubscribeParams {
    /// Top-level resource to receive events for. Omit to receive every event.
    #[serde(default)]
    #[param(example = "team-red")]
    pub(crate) scope: String,
}
