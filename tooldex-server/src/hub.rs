//! Pane hub
//!
//! The single owner of registry and subscription state. Constructed once at
//! startup and handed to the MCP handlers; every operation the controlling
//! agent can invoke lands here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use tooldex_protocol::{
    CaptureMode, DetachOutcome, InputDispatch, PaneCapture, PaneInfo, PaneUpdate,
    SubscriptionOpened, SweepReport, UsageStats, PRIMARY_ALIAS,
};
use tooldex_utils::{Result, TooldexError};

use crate::config::{AppConfig, SubscriptionConfig};
use crate::gateway::{GatewayError, PaneTarget, TerminalGateway};
use crate::maintenance::MaintenanceSweeper;
use crate::pane::{is_valid_name, OriginPane};
use crate::state::{HubState, SharedState};
use crate::subscription::{FetchRequest, Subscription, UpdateEngine};

pub struct PaneHub {
    gateway: Arc<dyn TerminalGateway>,
    state: SharedState,
    engine: UpdateEngine,
    sweeper: MaintenanceSweeper,
    config: SubscriptionConfig,
    origin_name: String,
}

/// Map a gateway failure for `name` onto the caller-facing taxonomy
fn pane_error(name: &str, err: GatewayError) -> TooldexError {
    if err.is_pane_vanished() {
        TooldexError::PaneNotFound(name.to_string())
    } else {
        err.into()
    }
}

impl PaneHub {
    pub fn new(gateway: Arc<dyn TerminalGateway>, config: &AppConfig) -> Self {
        let state = HubState::new(config.registry.max_panes).into_shared();
        let engine = UpdateEngine::new(Arc::clone(&gateway), state.clone(), &config.subscriptions);
        let sweeper = MaintenanceSweeper::new(state.clone(), &config.subscriptions);

        Self {
            gateway,
            state,
            engine,
            sweeper,
            config: config.subscriptions.clone(),
            origin_name: config.registry.origin_name.clone(),
        }
    }

    /// Remember the pane the server was launched from
    ///
    /// The locator is resolved now if possible; otherwise it is kept as a
    /// raw pane id. Nothing is attached until the primary alias is used.
    pub async fn detect_origin(&self, locator: &str) {
        let target = match self.gateway.resolve_target(locator).await {
            Ok(target) => target,
            Err(e) => {
                warn!(locator, error = %e, "could not resolve origin pane, keeping raw id");
                PaneTarget::bare(locator)
            }
        };

        info!(locator, pane_id = %target.pane_id, "origin pane detected");
        self.state.write().registry.set_origin(Some(OriginPane {
            name: self.origin_name.clone(),
            target,
        }));
    }

    /// Attach `locator` under `name`
    pub async fn attach(&self, name: &str, locator: &str, make_primary: bool) -> Result<PaneInfo> {
        if name == PRIMARY_ALIAS || !is_valid_name(name) {
            return Err(TooldexError::InvalidName(name.to_string()));
        }

        let target = self
            .gateway
            .resolve_target(locator)
            .await
            .map_err(|e| pane_error(locator, e))?;

        let mut state = self.state.write();
        let pane = state.registry.attach(name, target, make_primary)?;
        Ok(pane.to_info())
    }

    /// Detach a pane, cascading to its subscriptions
    pub fn detach(&self, name: &str) -> DetachOutcome {
        self.state.write().detach(name)
    }

    /// Resolve a name or the primary alias
    pub fn resolve(&self, name: &str) -> Result<PaneInfo> {
        let mut state = self.state.write();
        Ok(state.registry.resolve(name)?.to_info())
    }

    /// Attached panes, newest first
    pub fn list_panes(&self) -> Vec<PaneInfo> {
        let state = self.state.read();
        state.registry.list().into_iter().map(|p| p.to_info()).collect()
    }

    /// Name and gateway id of a resolved pane
    fn lookup(&self, name: &str) -> Result<(String, String)> {
        let mut state = self.state.write();
        let pane = state.registry.resolve(name)?;
        Ok((pane.name().to_string(), pane.pane_id().to_string()))
    }

    /// One-shot capture of a pane's last `lines` lines
    pub async fn read_pane(&self, name: &str, lines: usize, mode: CaptureMode) -> Result<PaneCapture> {
        if lines == 0 {
            return Err(TooldexError::invalid_argument("lines must be positive"));
        }

        let (pane, pane_id) = self.lookup(name)?;
        let wanted = lines.min(self.config.max_backfill_lines);
        let capture = self
            .gateway
            .capture_tail(&pane_id, wanted, mode)
            .await
            .map_err(|e| pane_error(&pane, e))?;

        // Content cut by the backfill cap also comes back clipped
        debug!(pane = %pane, requested = lines, returned = capture.lines.len(), "pane read");
        Ok(PaneCapture {
            pane,
            lines_requested: lines,
            lines_returned: capture.lines.len(),
            truncated: capture.clipped,
            mode,
            content: capture.lines,
        })
    }

    /// Type `text` into a pane, pressing Enter when `submit` is set
    pub async fn send_input(&self, name: &str, text: &str, submit: bool) -> Result<InputDispatch> {
        let (pane, pane_id) = self.lookup(name)?;
        self.gateway
            .send_input(&pane_id, text, submit)
            .await
            .map_err(|e| pane_error(&pane, e))?;

        info!(pane = %pane, chars = text.len(), submit, "input dispatched");
        let note = if submit {
            format!("Input dispatched to pane {}. Output will appear in-place.", pane)
        } else {
            format!("Input typed into pane {} without pressing Enter.", pane)
        };

        Ok(InputDispatch {
            pane,
            pane_id,
            text: text.to_string(),
            submitted: true,
            triggered_enter: submit,
            note,
        })
    }

    /// Open a subscription, optionally backfilled with recent lines
    pub async fn subscribe(&self, name: &str, mode: CaptureMode, backfill: usize) -> Result<SubscriptionOpened> {
        let (pane, pane_id) = self.lookup(name)?;

        let total = self
            .gateway
            .total_line_count(&pane_id)
            .await
            .map_err(|e| pane_error(&pane, e))?;

        let reachable = backfill.min(usize::try_from(total).unwrap_or(usize::MAX));
        let wanted = reachable.min(self.config.max_backfill_lines);
        let (initial_lines, initial_truncated) = if wanted > 0 {
            let capture = self
                .gateway
                .capture_tail(&pane_id, wanted, mode)
                .await
                .map_err(|e| pane_error(&pane, e))?;
            let truncated = capture.clipped || wanted < reachable;
            (capture.lines, truncated)
        } else {
            (Vec::new(), false)
        };

        let mut state = self.state.write();
        // The pane may have been detached while the gateway was answering
        if !state.registry.contains(&pane) {
            return Err(TooldexError::PaneNotFound(pane));
        }

        let token = state.store.generate_token();
        let mut subscription = Subscription::new(
            token.clone(),
            pane.clone(),
            mode,
            total,
            self.config.buffer_lines,
            self.config.snapshot_lines,
        );
        subscription.seed(&initial_lines);
        state.bind_subscription(subscription)?;

        info!(token = %token, pane = %pane, lines_recorded = total, backfill = initial_lines.len(), "subscribed");
        Ok(SubscriptionOpened {
            token,
            pane,
            mode,
            lines_recorded: total,
            initial_lines,
            initial_truncated,
        })
    }

    /// Fetch the next batch; `None` falls back to the configured defaults
    pub async fn fetch(&self, token: &str, timeout: Option<Duration>, max_lines: Option<usize>) -> Result<PaneUpdate> {
        let request = FetchRequest {
            timeout: timeout.unwrap_or_else(|| self.config.default_timeout()),
            max_lines: max_lines.unwrap_or(self.config.default_max_lines),
        };
        self.engine.fetch(token, request).await
    }

    /// Remove a subscription; `false` if the token was unknown
    pub fn unsubscribe(&self, token: &str) -> bool {
        let removed = self.state.write().remove_subscription(token);
        if removed {
            info!(token, "unsubscribed");
        }
        removed
    }

    /// Re-read up to `lines` recent lines from a subscription's ring buffer
    pub fn replay(&self, token: &str, lines: usize) -> Result<Vec<String>> {
        let state = self.state.read();
        let cell = state
            .store
            .get(token)
            .ok_or_else(|| TooldexError::SubscriptionNotFound(token.to_string()))?;

        let mut sub = cell.lock();
        sub.touch();
        Ok(sub.replay(lines))
    }

    /// Evict subscriptions idle longer than `max_age` (default: configured idle timeout)
    pub fn sweep_idle(&self, max_age: Option<Duration>) -> SweepReport {
        let max_age = max_age.unwrap_or_else(|| self.sweeper.default_max_age());
        SweepReport {
            removed: self.sweeper.sweep_idle(max_age),
            max_age_secs: max_age.as_secs(),
        }
    }

    /// Usage figures, sweeping first when over the memory threshold
    pub fn stats(&self) -> UsageStats {
        self.sweeper.stats()
    }
}
