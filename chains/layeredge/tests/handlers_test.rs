use anyhow::{anyhow, Result};
use async_trait::async_trait;
use core_logic::{ProxyConfig, ProxyManager, WalletEntry};
use layeredge_project::bot::session::{self, Language, SessionContext, Storage};
use layeredge_project::bot::{Notifier, RunEvent};
use layeredge_project::proxy_pool::PoolSettings;
use layeredge_project::{
    AccountResult, AccountRunner, AccountState, CheckIn, LivenessProbe, NodeSession,
    ProxyPoolManager, ProxySource, SessionFactory, Wallet,
};
use serde_json::Number;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

#[derive(Default)]
struct RecordingNotifier {
    events: Mutex<Vec<RunEvent>>,
}

impl RecordingNotifier {
    fn keys(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.key()).collect()
    }

    fn last(&self) -> Option<RunEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: RunEvent) {
        self.events.lock().unwrap().push(event);
    }
}

struct OkSession {
    address: String,
    accepts_registration: bool,
    steps: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl NodeSession for OkSession {
    fn address(&self) -> &str {
        &self.address
    }
    async fn register_wallet(&self) -> Result<bool> {
        self.steps.lock().unwrap().push("register");
        Ok(self.accepts_registration)
    }
    async fn daily_check_in(&self) -> Result<Option<CheckIn>> {
        self.steps.lock().unwrap().push("check_in");
        Ok(Some(CheckIn::Claimed))
    }
    async fn connect_node(&self) -> Result<bool> {
        self.steps.lock().unwrap().push("connect");
        Ok(true)
    }
    async fn check_points(&self) -> Result<Option<Number>> {
        self.steps.lock().unwrap().push("points");
        Ok(Some(Number::from(7u64)))
    }
}

struct OkFactory {
    used: Arc<Mutex<Vec<String>>>,
    steps: Arc<Mutex<Vec<&'static str>>>,
    accepts_registration: bool,
}

impl Default for OkFactory {
    fn default() -> Self {
        Self {
            used: Arc::default(),
            steps: Arc::default(),
            accepts_registration: true,
        }
    }
}

impl SessionFactory for OkFactory {
    type Session = OkSession;

    fn build(&self, proxy: Option<&ProxyConfig>, wallet: &WalletEntry) -> Result<OkSession> {
        if let Some(p) = proxy {
            self.used.lock().unwrap().push(p.url.clone());
        }
        Ok(OkSession {
            address: Wallet::from_entry(wallet)?.address().to_string(),
            accepts_registration: self.accepts_registration,
            steps: self.steps.clone(),
        })
    }
}

struct ListSource {
    list: Vec<String>,
    reachable: bool,
}

#[async_trait]
impl ProxySource for ListSource {
    async fn fetch_batch(&self, offset: usize, limit: usize) -> Result<Vec<String>> {
        if !self.reachable {
            return Err(anyhow!("dns error"));
        }
        Ok(self.list.iter().skip(offset).take(limit).cloned().collect())
    }
}

struct AlwaysAlive;

#[async_trait]
impl LivenessProbe for AlwaysAlive {
    async fn is_alive(&self, _candidate: &str) -> bool {
        true
    }
}

struct Fixture {
    _dir: TempDir,
    storage: Storage,
    notifier: Arc<RecordingNotifier>,
    ctx: SessionContext,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let storage = Storage::new(
        dir.path().join("wallets.json"),
        dir.path().join("proxies.txt"),
        dir.path().join("walletInfo.json"),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = SessionContext::new(Some("42".to_string()), notifier.clone());
    Fixture {
        _dir: dir,
        storage,
        notifier,
        ctx,
    }
}

fn pool(n: usize, reachable: bool) -> ProxyPoolManager<ListSource, AlwaysAlive> {
    let source = ListSource {
        list: (0..n).map(|i| format!("192.168.1.{}:8080", i)).collect(),
        reachable,
    };
    ProxyPoolManager::new(
        source,
        AlwaysAlive,
        PoolSettings {
            batch_size: 50,
            batch_pause: Duration::ZERO,
        },
    )
}

fn store_key(f: &Fixture, i: usize) {
    f.storage
        .wallets
        .append(WalletEntry::from_input(&format!("{:064x}", i)).unwrap())
        .unwrap();
}

#[tokio::test]
async fn test_add_private_key_validation() {
    let f = fixture();

    assert!(!session::add_private_key(&f.ctx, &f.storage, "   ").await);
    assert_eq!(f.notifier.last(), Some(RunEvent::PrivateKeyEmpty));

    assert!(!session::add_private_key(&f.ctx, &f.storage, "0x1234").await);
    assert_eq!(f.notifier.last(), Some(RunEvent::PrivateKeyInvalid));

    let not_hex = "z".repeat(64);
    assert!(!session::add_private_key(&f.ctx, &f.storage, &not_hex).await);
    assert_eq!(f.notifier.last(), Some(RunEvent::PrivateKeyInvalid));

    assert!(session::add_private_key(&f.ctx, &f.storage, KEY).await);
    assert_eq!(f.notifier.last(), Some(RunEvent::PrivateKeySuccess));

    let stored: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(f.storage.wallets.path()).unwrap()).unwrap();
    assert_eq!(stored[0]["privateKey"], format!("0x{}", KEY));
}

#[tokio::test]
async fn test_private_key_flow_through_session() {
    let mut f = fixture();

    assert_eq!(f.ctx.submit_text(&f.storage, KEY).await, None);

    f.ctx.request_private_key().await;
    assert!(f.ctx.awaiting_private_key);
    assert_eq!(f.notifier.last(), Some(RunEvent::PrivateKeyPrompt));

    assert_eq!(f.ctx.submit_text(&f.storage, KEY).await, Some(true));
    assert!(!f.ctx.awaiting_private_key);
    assert_eq!(f.storage.wallets.count().unwrap(), 1);
}

#[tokio::test]
async fn test_show_info_renders_blocks() {
    let f = fixture();

    assert_eq!(session::show_info(&f.ctx, &f.storage).await, 0);
    assert_eq!(f.notifier.last(), Some(RunEvent::NoWalletsInfo));

    f.storage
        .save_results(&[
            AccountResult {
                address: "0xA".to_string(),
                points: Number::from(10u64),
            },
            AccountResult {
                address: "0xB".to_string(),
                points: Number::from(0u64),
            },
        ])
        .unwrap();

    assert_eq!(session::show_info(&f.ctx, &f.storage).await, 2);
    assert_eq!(
        f.notifier.last(),
        Some(RunEvent::Info {
            total: 2,
            details: "Wallet 1:\nAddress: 0xA\nPoints: 10\n\nWallet 2:\nAddress: 0xB\nPoints: 0\n\n"
                .to_string()
        })
    );
}

#[tokio::test]
async fn test_load_proxies_requires_wallets() {
    let f = fixture();

    let report = session::load_proxies(&f.ctx, &f.storage, &pool(10, true))
        .await
        .unwrap();

    assert!(report.is_none());
    assert_eq!(f.notifier.keys(), vec!["noWallets"]);
    assert!(!f.storage.proxies.exists());
}

#[tokio::test]
async fn test_load_proxies_writes_required_count() {
    let f = fixture();
    store_key(&f, 1);
    store_key(&f, 2);

    let report = session::load_proxies(&f.ctx, &f.storage, &pool(50, true))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.proxies.len(), 6);
    let content = fs::read_to_string(&f.storage.proxies).unwrap();
    assert_eq!(content.lines().count(), 6);
    assert!(content.starts_with("http://192.168.1.0:8080"));

    let reloaded = ProxyManager::load_proxies(&f.storage.proxies).unwrap();
    assert_eq!(reloaded, report.proxies);

    let keys = f.notifier.keys();
    assert_eq!(&keys[..2], ["clearingProxies", "needProxies"]);
    assert_eq!(keys.last(), Some(&"proxiesSaved"));
}

#[tokio::test]
async fn test_load_proxies_unreachable_source_persists_nothing() {
    let f = fixture();
    store_key(&f, 1);

    let result = session::load_proxies(&f.ctx, &f.storage, &pool(0, false)).await;

    assert!(result.is_err());
    assert!(!f.storage.proxies.exists());
    assert_eq!(f.notifier.keys().last(), Some(&"fetchFail"));
}

#[tokio::test]
async fn test_run_overwrites_results() {
    let f = fixture();
    store_key(&f, 1);
    store_key(&f, 2);
    let proxies: Vec<ProxyConfig> = (0..6)
        .map(|i| ProxyConfig::new(&format!("10.1.1.{}:80", i)))
        .collect();
    ProxyManager::save_proxies(&f.storage.proxies, &proxies).unwrap();
    f.storage
        .save_results(&[AccountResult {
            address: "0xstale".to_string(),
            points: Number::from(1u64),
        }])
        .unwrap();

    let runner = AccountRunner::new(OkFactory::default(), Duration::ZERO);
    let report = session::run(&f.ctx, &f.storage, &runner)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(report.results.len(), 2);
    let stored = f.storage.load_results();
    assert_eq!(stored, report.results);
    assert!(stored.iter().all(|r| r.points == Number::from(7u64)));

    let keys = f.notifier.keys();
    assert_eq!(&keys[keys.len() - 2..], ["done", "runAgain"]);
}

#[tokio::test]
async fn test_run_precondition_leaves_results_alone() {
    let f = fixture();
    store_key(&f, 1);
    store_key(&f, 2);
    ProxyManager::save_proxies(&f.storage.proxies, &[ProxyConfig::new("10.1.1.1:80")]).unwrap();

    let runner = AccountRunner::new(OkFactory::default(), Duration::ZERO);
    let report = session::run(&f.ctx, &f.storage, &runner).await.unwrap();

    assert!(report.is_none());
    assert!(!f.storage.results.exists());
    assert_eq!(f.notifier.keys(), vec!["startBot", "notEnoughProxies"]);
}

#[tokio::test]
async fn test_create_wallet_without_proxies_still_stores_wallet() {
    let f = fixture();
    let runner = AccountRunner::new(OkFactory::default(), Duration::ZERO);

    let account = session::create_wallet_and_run(&f.ctx, &f.storage, &runner)
        .await
        .unwrap();

    assert!(account.is_none());
    assert_eq!(f.storage.wallets.count().unwrap(), 1);
    assert_eq!(
        f.notifier.keys(),
        vec!["newWallet", "walletCreated", "walletAdded", "noProxies"]
    );
}

#[tokio::test]
async fn test_create_wallet_runs_once_and_appends_result() {
    let f = fixture();
    store_key(&f, 1);
    store_key(&f, 2);
    let proxies = vec![ProxyConfig::new("10.2.2.1:80"), ProxyConfig::new("10.2.2.2:80")];
    ProxyManager::save_proxies(&f.storage.proxies, &proxies).unwrap();
    f.storage
        .save_results(&[AccountResult {
            address: "0xold".to_string(),
            points: Number::from(3u64),
        }])
        .unwrap();

    let factory = OkFactory::default();
    let used = factory.used.clone();
    let runner = AccountRunner::new(factory, Duration::ZERO);

    let account = session::create_wallet_and_run(&f.ctx, &f.storage, &runner)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(account.state, AccountState::Done { proxy: 0 });
    // Third wallet, two proxies: the last proxy is used
    assert_eq!(*used.lock().unwrap(), vec!["http://10.2.2.2:80".to_string()]);

    let stored = f.storage.load_results();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].address, "0xold");
    assert_eq!(Some(&stored[1]), account.result.as_ref());
    assert_eq!(f.storage.wallets.count().unwrap(), 3);
}

#[tokio::test]
async fn test_create_wallet_runs_every_step_after_rejected_registration() {
    let f = fixture();
    ProxyManager::save_proxies(&f.storage.proxies, &[ProxyConfig::new("10.3.3.1:80")]).unwrap();

    let factory = OkFactory {
        accepts_registration: false,
        ..OkFactory::default()
    };
    let steps = factory.steps.clone();
    let runner = AccountRunner::new(factory, Duration::ZERO);

    let account = session::create_wallet_and_run(&f.ctx, &f.storage, &runner)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        *steps.lock().unwrap(),
        vec!["register", "check_in", "connect", "points"]
    );
    assert_eq!(account.state, AccountState::Done { proxy: 0 });
    assert_eq!(f.storage.load_results().len(), 1);

    let keys = f.notifier.keys();
    assert!(keys.contains(&"registerFail"));
    assert!(!keys.contains(&"skipAccount"));
    assert_eq!(keys.last(), Some(&"accountSuccess"));
}

#[tokio::test]
async fn test_malformed_wallet_file_blocks_new_keys() {
    let f = fixture();
    let original = format!(r#"[{{"privateKey":"0x{}"}},{{"privatekey":"0x00"}}]"#, KEY);
    fs::write(f.storage.wallets.path(), &original).unwrap();

    assert!(!session::add_private_key(&f.ctx, &f.storage, &"a".repeat(64)).await);
    assert!(matches!(
        f.notifier.last(),
        Some(RunEvent::PrivateKeyFail { .. })
    ));
    assert_eq!(fs::read_to_string(f.storage.wallets.path()).unwrap(), original);

    let runner = AccountRunner::new(OkFactory::default(), Duration::ZERO);
    assert!(session::create_wallet_and_run(&f.ctx, &f.storage, &runner)
        .await
        .is_err());
    assert!(session::load_proxies(&f.ctx, &f.storage, &pool(10, true))
        .await
        .is_err());
    assert_eq!(fs::read_to_string(f.storage.wallets.path()).unwrap(), original);
}

#[test]
fn test_language_codes() {
    assert_eq!("fa".parse::<Language>().unwrap(), Language::Persian);
    assert_eq!(" English ".parse::<Language>().unwrap(), Language::English);
    assert!("xx".parse::<Language>().is_err());
}
