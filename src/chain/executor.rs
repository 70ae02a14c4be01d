//! Chain execution.

use crate::chain::FilterChain;
use crate::filter::{Exchange, FilterAction, FilterError};

/// Runs an ordered chain against one exchange.
pub trait FilterExecutor: Send + Sync {
    fn execute(
        &self,
        chain: &FilterChain,
        exchange: &mut Exchange,
    ) -> Result<FilterAction, FilterError>;
}

/// Runs filters one after another; the first `Respond` ends the chain.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialExecutor;

impl FilterExecutor for SequentialExecutor {
    fn execute(
        &self,
        chain: &FilterChain,
        exchange: &mut Exchange,
    ) -> Result<FilterAction, FilterError> {
        for filter in chain {
            exchange.record(filter.name());
            match filter.filter(exchange)? {
                FilterAction::Continue => {}
                respond @ FilterAction::Respond(..) => {
                    tracing::debug!(
                        request_id = %exchange.request_id,
                        filter = filter.name(),
                        "Filter chain short-circuited"
                    );
                    return Ok(respond);
                }
            }
        }
        Ok(FilterAction::Continue)
    }
}
