use std::sync::Arc;

use chakwrite_broker::context::ContextManager;
use chakwrite_broker::correlator::Correlator;
use chakwrite_broker::dispatcher::Dispatcher;
use chakwrite_broker::metrics::BrokerMetrics;
use chakwrite_broker::page::PageChannel;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub context: Arc<ContextManager>,
    pub correlator: Arc<Correlator>,
    pub page: PageChannel,
    pub metrics: Arc<BrokerMetrics>,
}
