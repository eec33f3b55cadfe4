use crate::health::ApiStatus;
use crate::transport::ChannelEnvelope;

#[derive(Debug, Clone)]
pub enum AppEvent {
    Channel(ChannelEnvelope),
    HealthChecked(ApiStatus),
}
