//! End-to-end flow: a page edits the card, the worker schedules warnings and
//! the presenter shows the countdown, all through the broadcast channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rallycard::{
    BroadcastHub, CheckpointField, CheckpointList, ManualClock, MessageKind, NotificationOptions,
    NotificationWorker, Notifier, PageContext, PresenterSettings, SchedulerSettings, parse_time,
};

#[derive(Clone, Default)]
struct Recorder {
    shown: Arc<Mutex<Vec<(String, NotificationOptions)>>>,
}

impl Recorder {
    fn titles(&self) -> Vec<String> {
        self.shown.lock().unwrap().iter().map(|(title, _)| title.clone()).collect()
    }
}

#[async_trait::async_trait]
impl Notifier for Recorder {
    async fn show(&self, title: &str, options: &NotificationOptions) -> rallycard::Result<()> {
        self.shown.lock().unwrap().push((title.to_string(), options.clone()));
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn at(time: &str) -> i64 {
    parse_time(time).unwrap()
}

/// Start at 09:00, PKC 2 arrives at 09:30.
fn build_card(page: &PageContext) {
    page.replace_checkpoints(CheckpointList::new_card(2)).unwrap();
    page.edit(1, CheckpointField::ProvisionalStartTime, at("09:00")).unwrap();
    page.edit(2, CheckpointField::ProvisionalStartTime, at("09:10")).unwrap();
    page.edit(2, CheckpointField::DrivingTime, at("00:20")).unwrap();
}

#[tokio::test(start_paused = true)]
async fn page_edits_drive_warnings_and_countdown() {
    init_tracing();
    let hub = BroadcastHub::new("flow", 64);
    let clock = ManualClock::new(at("09:20"));
    let recorder = Recorder::default();
    let worker = NotificationWorker::spawn(
        &hub,
        Arc::new(recorder.clone()),
        Arc::new(clock.clone()),
        SchedulerSettings::default(),
    );

    let page = PageContext::open(&hub, None);
    let presenter = page.presenter(Arc::new(clock.clone()), &PresenterSettings::default());
    let mut display = presenter.watch();

    build_card(&page);
    assert_eq!(page.checkpoints()[1].arrival_time, at("09:30"));

    loop {
        display.changed().await.unwrap();
        if presenter.current().is_some_and(|d| d.label == "arrive at PKC2") {
            break;
        }
    }
    assert_eq!(presenter.current().unwrap().to_string(), "00:10:00");

    // 09:25 and 09:29 warnings
    tokio::time::sleep(Duration::from_secs(10 * 60)).await;
    assert_eq!(recorder.titles(), vec!["5 minutes left", "1 minute left"]);

    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn republishing_the_same_card_warns_once_per_lead_time() {
    let hub = BroadcastHub::new("flow-repeat", 64);
    let clock = ManualClock::new(at("09:20"));
    let recorder = Recorder::default();
    let worker = NotificationWorker::spawn(
        &hub,
        Arc::new(recorder.clone()),
        Arc::new(clock.clone()),
        SchedulerSettings::default(),
    );
    let page = PageContext::open(&hub, None);

    build_card(&page);
    page.publish_panels().unwrap();
    page.publish_panels().unwrap();

    tokio::time::sleep(Duration::from_secs(15 * 60)).await;
    let titles = recorder.titles();
    assert_eq!(titles.iter().filter(|title| *title == "5 minutes left").count(), 1);
    assert_eq!(titles.iter().filter(|title| *title == "1 minute left").count(), 1);

    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn restarted_worker_recovers_from_the_next_snapshot() {
    let hub = BroadcastHub::new("flow-restart", 64);
    let clock = ManualClock::new(at("09:20"));
    let page = PageContext::open(&hub, None);
    build_card(&page);

    let first = Recorder::default();
    let worker = NotificationWorker::spawn(
        &hub,
        Arc::new(first.clone()),
        Arc::new(clock.clone()),
        SchedulerSettings::default(),
    );
    page.publish_panels().unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;
    worker.shutdown().await;

    let second = Recorder::default();
    let worker = NotificationWorker::spawn(
        &hub,
        Arc::new(second.clone()),
        Arc::new(clock.clone()),
        SchedulerSettings::default(),
    );
    clock.set(at("09:21"));
    page.publish_panels().unwrap();
    tokio::time::sleep(Duration::from_secs(15 * 60)).await;

    assert!(first.titles().is_empty());
    assert_eq!(second.titles(), vec!["5 minutes left", "1 minute left"]);
    worker.shutdown().await;
}

#[tokio::test]
async fn page_never_hears_its_own_test_request() {
    let hub = BroadcastHub::new("flow-self", 16);
    let recorder = Recorder::default();
    let worker = NotificationWorker::spawn(
        &hub,
        Arc::new(recorder.clone()),
        Arc::new(ManualClock::new(at("09:00"))),
        SchedulerSettings::default(),
    );
    let page = PageContext::open(&hub, None);

    let echoed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&echoed);
    let _own = page.endpoint().subscribe(MessageKind::NotifyTest, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    page.request_test_notification("hello").unwrap();
    for _ in 0..100 {
        if !recorder.titles().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(recorder.titles(), vec!["Test notification"]);
    assert_eq!(echoed.load(Ordering::SeqCst), 0);
    worker.shutdown().await;
}
