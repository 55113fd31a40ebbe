use std::sync::Arc;

use crate::{
    auth::jwt::JwtService, config::AppConfig, discussions::DiscussionBoard, events::ChangeHub,
    messaging::MessageGateway, store::Store,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn MessageGateway>,
    pub jwt: JwtService,
    pub events: ChangeHub,
    pub board: DiscussionBoard,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        config: AppConfig,
        gateway: Arc<dyn MessageGateway>,
        jwt: JwtService,
    ) -> Self {
        Self {
            store,
            config: Arc::new(config),
            gateway,
            jwt,
            events: ChangeHub::default(),
            board: DiscussionBoard::new(),
        }
    }
}
