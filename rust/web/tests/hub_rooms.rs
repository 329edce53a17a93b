use gemstone_web::{Hub, HubConfig, Payload, TestLogSubscriber};
use tokio::sync::mpsc;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

fn hub(outbound_capacity: usize) -> Hub {
    Hub::spawn(HubConfig {
        intake_capacity: 64,
        outbound_capacity,
    })
    .0
}

async fn join(hub: &Hub, game_id: i64, player: i64) -> mpsc::Receiver<Payload> {
    let (connection, receiver) = hub.connect(game_id, Some(player));
    hub.register(connection).await.expect("register");
    receiver
}

fn drain(receiver: &mut mpsc::Receiver<Payload>) -> Vec<String> {
    let mut seen = Vec::new();
    while let Ok(payload) = receiver.try_recv() {
        seen.push(payload.to_string());
    }
    seen
}

#[tokio::test]
async fn broadcast_reaches_every_member_of_the_room() {
    let hub = hub(8);
    let mut a = join(&hub, 1, 10).await;
    let mut b = join(&hub, 1, 20).await;
    let mut c = join(&hub, 1, 30).await;
    assert_eq!(hub.room_member_count(1), 3);

    hub.broadcast_to_room(1, "turn passed").await;
    hub.flush().await.expect("flush");

    for receiver in [&mut a, &mut b, &mut c] {
        assert_eq!(drain(receiver), vec!["turn passed"]);
    }
}

#[tokio::test]
async fn rooms_are_isolated() {
    let hub = hub(8);
    let mut first = join(&hub, 1, 10).await;
    let mut second = join(&hub, 2, 20).await;

    hub.broadcast_to_room(1, "only for game 1").await;
    hub.broadcast_to_room(3, "nobody listens").await;
    hub.flush().await.expect("flush");

    assert_eq!(drain(&mut first), vec!["only for game 1"]);
    assert!(drain(&mut second).is_empty());
    assert_eq!(hub.room_count(), 2);
}

#[tokio::test]
async fn last_member_leaving_removes_the_room() {
    let hub = hub(8);
    let (a, _a_rx) = hub.connect(4, Some(1));
    let (b, _b_rx) = hub.connect(4, Some(2));
    let (a_id, b_id) = (a.id(), b.id());
    hub.register(a).await.expect("register");
    hub.register(b).await.expect("register");

    assert!(hub.unregister(4, a_id).await.expect("unregister"));
    assert_eq!(hub.room_member_count(4), 1);
    assert_eq!(hub.room_count(), 1);

    assert!(hub.unregister(4, b_id).await.expect("unregister"));
    assert_eq!(hub.room_member_count(4), 0);
    assert_eq!(hub.room_count(), 0);
}

#[tokio::test]
async fn payloads_from_one_producer_keep_their_order() {
    let hub = hub(64);
    let mut receiver = join(&hub, 1, 10).await;

    for n in 0..20 {
        hub.broadcast_to_room(1, format!("event {n}")).await;
    }
    hub.flush().await.expect("flush");

    let expected: Vec<String> = (0..20).map(|n| format!("event {n}")).collect();
    assert_eq!(drain(&mut receiver), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_and_members_settle() {
    let hub = hub(256);
    let mut listener = join(&hub, 9, 1).await;

    let mut tasks = Vec::new();
    for producer in 0..8 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            for n in 0..10 {
                hub.broadcast_to_room(9, format!("{producer}:{n}")).await;
            }
        }));
    }
    for member in 0..8 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let (connection, _rx) = hub.connect(9, Some(100 + member));
            let id = connection.id();
            hub.register(connection).await.expect("register");
            hub.unregister(9, id).await.expect("unregister");
        }));
    }
    for task in tasks {
        task.await.expect("task");
    }
    hub.flush().await.expect("flush");

    assert_eq!(hub.room_member_count(9), 1);
    let received = drain(&mut listener);
    assert_eq!(received.len(), 80);
    for producer in 0..8 {
        let own: Vec<&String> = received
            .iter()
            .filter(|p| p.starts_with(&format!("{producer}:")))
            .collect();
        let expected: Vec<String> = (0..10).map(|n| format!("{producer}:{n}")).collect();
        assert_eq!(own, expected.iter().collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn stalled_connection_is_dropped_with_a_warning() {
    let subscriber = TestLogSubscriber::new();
    let registry = Registry::default().with(subscriber.clone().into_layer::<Registry>());
    let _guard = tracing::subscriber::set_default(registry);

    let hub = hub(2);
    let _stalled = join(&hub, 6, 1).await;
    let mut healthy = join(&hub, 6, 2).await;

    for n in 0..3 {
        hub.broadcast_to_room(6, format!("event {n}")).await;
        hub.flush().await.expect("flush");
        drain(&mut healthy);
    }

    assert_eq!(hub.room_players(6), vec![2]);
    let warning = subscriber
        .entries()
        .into_iter()
        .find(|e| e.level == Level::WARN && e.message.contains("outbound queue full"))
        .expect("eviction logged");
    assert_eq!(warning.field("game_id"), Some("6"));
    assert_eq!(warning.field("player_id"), Some("Some(1)"));
}
