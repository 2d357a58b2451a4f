//! Per-turn context. Conversation state and the service client are threaded
//! through stages explicitly; nothing in the crate reaches for globals.

use domain::state::ConversationState;
use infrastructure::ExperimentApi;

pub struct TurnContext<'a> {
    pub state: &'a mut ConversationState,
    pub api: &'a dyn ExperimentApi,
}

impl<'a> TurnContext<'a> {
    pub fn new(state: &'a mut ConversationState, api: &'a dyn ExperimentApi) -> Self {
        Self { state, api }
    }
}
