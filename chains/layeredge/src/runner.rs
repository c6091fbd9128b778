//! Account Task Runner
//!
//! Wallets are processed one after another. Each wallet gets its own group of
//! up to three proxies and walks an [`AccountMachine`]:
//!
//! ```text
//! Pending -> Register(k) -> CheckIn(k) -> Connect(k) -> Points(k) -> Done(k)
//!               |  rejected / aborted
//!               v
//!            Register(k+1) ... -> Attempted | Skipped
//! ```
//!
//! Soft failures (an exhausted request, a missing points value) do not move
//! the machine off the current proxy. Hard errors from a session abort the
//! attempt and fall back to the next candidate.

use crate::bot::notification::{Notifier, RunEvent, StepKind};
use crate::client::{CheckIn, NodeSession, SessionFactory};
use crate::wallet::Wallet;
use anyhow::Result;
use core_logic::{PreconditionError, ProxyConfig, ProxyManager, WalletEntry, PROXIES_PER_WALLET};
use serde::{Deserialize, Serialize};
use serde_json::Number;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One line of `walletInfo.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResult {
    pub address: String,
    /// Kept as the API's number, fractional scores included.
    pub points: Number,
}

/// Where a wallet is in its step sequence. `proxy` indexes the wallet's
/// proxy group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountState {
    Pending,
    Register { proxy: usize },
    CheckIn { proxy: usize },
    Connect { proxy: usize },
    Points { proxy: usize },
    Done { proxy: usize },
    /// Registered through some proxy, but no proxy finished the sequence.
    Attempted,
    Skipped,
}

impl AccountState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AccountState::Done { .. } | AccountState::Attempted | AccountState::Skipped
        )
    }
}

/// Result of the step the machine is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The step ran; soft failures count as advancing.
    Advance,
    /// Registration answered with nothing.
    Rejected,
    /// A hard error ended this proxy attempt.
    Aborted,
}

#[derive(Debug, Clone)]
pub struct AccountMachine {
    state: AccountState,
    candidates: usize,
    registered: bool,
    continue_unregistered: bool,
}

impl AccountMachine {
    pub fn new(candidates: usize) -> Self {
        Self {
            state: AccountState::Pending,
            candidates: candidates.min(PROXIES_PER_WALLET),
            registered: false,
            continue_unregistered: false,
        }
    }

    /// One candidate, and a rejected registration still runs the remaining
    /// steps on it.
    pub fn single() -> Self {
        Self {
            continue_unregistered: true,
            ..Self::new(1)
        }
    }

    pub fn state(&self) -> AccountState {
        self.state
    }

    /// Registration succeeded on at least one proxy.
    pub fn registered(&self) -> bool {
        self.registered
    }

    pub fn start(&mut self) -> AccountState {
        if self.state == AccountState::Pending {
            self.state = if self.candidates > 0 {
                AccountState::Register { proxy: 0 }
            } else {
                AccountState::Skipped
            };
        }
        self.state
    }

    pub fn apply(&mut self, transition: Transition) -> AccountState {
        use AccountState::*;

        self.state = match (self.state, transition) {
            (Pending, _) => return self.start(),
            (state, _) if state.is_terminal() => state,

            (Register { proxy }, Transition::Advance) => {
                self.registered = true;
                CheckIn { proxy }
            }
            (Register { proxy }, Transition::Rejected) if self.continue_unregistered => {
                CheckIn { proxy }
            }
            (Register { proxy }, _) => self.fallback(proxy),

            (CheckIn { proxy }, Transition::Aborted)
            | (Connect { proxy }, Transition::Aborted)
            | (Points { proxy }, Transition::Aborted) => self.fallback(proxy),

            (CheckIn { proxy }, _) => Connect { proxy },
            (Connect { proxy }, _) => Points { proxy },
            (Points { proxy }, _) => Done { proxy },

            (state, _) => state,
        };
        self.state
    }

    fn fallback(&self, proxy: usize) -> AccountState {
        if proxy + 1 < self.candidates {
            AccountState::Register { proxy: proxy + 1 }
        } else if self.registered {
            AccountState::Attempted
        } else {
            AccountState::Skipped
        }
    }
}

/// Outcome of one wallet.
#[derive(Debug, Clone)]
pub struct AccountRun {
    pub state: AccountState,
    pub result: Option<AccountResult>,
}

#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<AccountResult>,
    pub states: Vec<AccountState>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.states.len()
    }

    pub fn skipped(&self) -> usize {
        self.states
            .iter()
            .filter(|s| **s == AccountState::Skipped)
            .count()
    }

    pub fn completed(&self) -> usize {
        self.states
            .iter()
            .filter(|s| matches!(s, AccountState::Done { .. }))
            .count()
    }
}

pub struct AccountRunner<F> {
    factory: F,
    step_delay: Duration,
}

impl<F: SessionFactory> AccountRunner<F> {
    pub fn new(factory: F, step_delay: Duration) -> Self {
        Self {
            factory,
            step_delay,
        }
    }

    /// Processes every wallet with its proxy group. Fails only when the
    /// wallet/proxy counts make a run impossible.
    pub async fn run(
        &self,
        wallets: &[WalletEntry],
        proxies: &[ProxyConfig],
        notifier: &dyn Notifier,
    ) -> Result<RunReport, PreconditionError> {
        notifier.notify(RunEvent::StartBot).await;

        if let Err(e) = PreconditionError::check(wallets.len(), proxies.len()) {
            let event = match &e {
                PreconditionError::NoWallets => RunEvent::NoWallets,
                PreconditionError::NoProxies => RunEvent::NoProxies,
                PreconditionError::NotEnoughProxies { proxies, wallets } => {
                    RunEvent::NotEnoughProxies {
                        proxies: *proxies,
                        wallets: *wallets,
                    }
                }
            };
            warn!("Run aborted: {}", e);
            notifier.notify(event).await;
            return Err(e);
        }

        let total = wallets.len();
        notifier.notify(RunEvent::Processing { count: total }).await;

        let groups = ProxyManager::partition_groups(proxies);
        let mut report = RunReport::default();

        for (index, wallet) in wallets.iter().enumerate() {
            let group = groups.get(index).copied().unwrap_or_default();
            let account = self
                .process_wallet(index, total, wallet, group, notifier)
                .await;

            report.states.push(account.state);
            if let Some(result) = account.result {
                report.results.push(result);
            }
        }

        info!(
            "Run finished: {} completed, {} skipped, {} results",
            report.completed(),
            report.skipped(),
            report.results.len()
        );
        Ok(report)
    }

    /// Runs one wallet against `group`, falling back through at most three
    /// candidates.
    pub async fn process_wallet(
        &self,
        index: usize,
        total: usize,
        wallet: &WalletEntry,
        group: &[ProxyConfig],
        notifier: &dyn Notifier,
    ) -> AccountRun {
        let machine = AccountMachine::new(group.len());
        self.drive(index, total, wallet, group, machine, notifier)
            .await
    }

    /// Runs every step once through `proxy`, without fallback. A rejected
    /// registration does not stop the sequence.
    pub async fn run_single(
        &self,
        wallet: &WalletEntry,
        proxy: &ProxyConfig,
        notifier: &dyn Notifier,
    ) -> AccountRun {
        let group = std::slice::from_ref(proxy);
        self.drive(0, 1, wallet, group, AccountMachine::single(), notifier)
            .await
    }

    async fn drive(
        &self,
        index: usize,
        total: usize,
        wallet: &WalletEntry,
        group: &[ProxyConfig],
        mut machine: AccountMachine,
        notifier: &dyn Notifier,
    ) -> AccountRun {
        let label = Wallet::from_entry(wallet)
            .map(|w| w.short_address())
            .unwrap_or_else(|_| "<invalid key>".to_string());

        notifier.notify(RunEvent::AccountDivider).await;
        notifier
            .notify(RunEvent::AccountInfo {
                current: index + 1,
                total,
                wallet: label.clone(),
            })
            .await;

        let mut session: Option<F::Session> = None;
        let mut result = None;

        machine.start();
        loop {
            let proxy = match machine.state() {
                AccountState::Done { proxy } => {
                    notifier
                        .notify(RunEvent::AccountSuccess {
                            current: index + 1,
                            proxy: group[proxy].to_string(),
                        })
                        .await;
                    break;
                }
                AccountState::Attempted => {
                    debug!("Wallet {} registered but no proxy finished", label);
                    break;
                }
                AccountState::Skipped => {
                    notifier
                        .notify(RunEvent::SkipAccount {
                            current: index + 1,
                        })
                        .await;
                    break;
                }
                AccountState::Pending => {
                    machine.start();
                    continue;
                }
                AccountState::Register { proxy }
                | AccountState::CheckIn { proxy }
                | AccountState::Connect { proxy }
                | AccountState::Points { proxy } => proxy,
            };

            let step = self
                .run_step(
                    machine.state(),
                    &group[proxy],
                    group.len(),
                    wallet,
                    &mut session,
                    &mut result,
                    notifier,
                )
                .await;

            let transition = match step {
                Ok(transition) => transition,
                Err(e) => {
                    session = None;
                    notifier
                        .notify(RunEvent::ProxyFail {
                            proxy: group[proxy].to_string(),
                            error: format!("{:#}", e),
                        })
                        .await;
                    if proxy + 1 >= machine.candidates {
                        notifier
                            .notify(RunEvent::AllProxiesFail {
                                wallet: label.clone(),
                            })
                            .await;
                    }
                    Transition::Aborted
                }
            };
            machine.apply(transition);
        }

        AccountRun {
            state: machine.state(),
            result,
        }
    }

    /// Executes the step `state` stands for. `Err` is a hard failure.
    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        state: AccountState,
        proxy: &ProxyConfig,
        group_len: usize,
        wallet: &WalletEntry,
        session: &mut Option<F::Session>,
        result: &mut Option<AccountResult>,
        notifier: &dyn Notifier,
    ) -> Result<Transition> {
        if let AccountState::Register { proxy: k } = state {
            notifier
                .notify(RunEvent::TryingProxy {
                    current: k + 1,
                    total: group_len,
                    proxy: proxy.to_string(),
                })
                .await;

            let built = self.factory.build(Some(proxy), wallet)?;
            let registered = timed(StepKind::Register, built.register_wallet(), notifier).await?;
            *session = Some(built);
            return Ok(if registered {
                notifier.notify(RunEvent::RegisterSuccess).await;
                Transition::Advance
            } else {
                notifier.notify(RunEvent::RegisterFail).await;
                Transition::Rejected
            });
        }

        self.pause().await;
        let Some(s) = session.as_ref() else {
            anyhow::bail!("no session for {}", proxy);
        };

        match state {
            AccountState::CheckIn { .. } => {
                match timed(StepKind::CheckIn, s.daily_check_in(), notifier).await? {
                    Some(CheckIn::Claimed) => notifier.notify(RunEvent::CheckInSuccess).await,
                    Some(CheckIn::AlreadyDone { next_time }) => {
                        notifier
                            .notify(RunEvent::CheckInAlready { next_time })
                            .await
                    }
                    None => debug!("Check-in for {} got no response", s.address()),
                }
            }
            AccountState::Connect { .. } => {
                if timed(StepKind::Connect, s.connect_node(), notifier).await? {
                    notifier.notify(RunEvent::ConnectSuccess).await;
                }
            }
            AccountState::Points { .. } => {
                if let Some(points) = timed(StepKind::Points, s.check_points(), notifier).await? {
                    let address = s.address().to_string();
                    notifier.notify(RunEvent::PointsSuccess).await;
                    notifier
                        .notify(RunEvent::PointsInfo {
                            address: address.clone(),
                            points: points.clone(),
                        })
                        .await;
                    *result = Some(AccountResult { address, points });
                }
            }
            _ => {}
        }
        Ok(Transition::Advance)
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }
}

/// Wraps a step with start/finish events carrying wall-clock timestamps.
async fn timed<T, Fut>(step: StepKind, fut: Fut, notifier: &dyn Notifier) -> T
where
    Fut: Future<Output = T>,
{
    let started_at = chrono::Utc::now().timestamp_millis();
    notifier
        .notify(RunEvent::StepStarted {
            step,
            at_ms: started_at,
        })
        .await;

    let started = Instant::now();
    let output = fut.await;

    notifier
        .notify(RunEvent::StepFinished {
            step,
            at_ms: chrono::Utc::now().timestamp_millis(),
            duration_ms: started.elapsed().as_millis(),
        })
        .await;
    output
}
