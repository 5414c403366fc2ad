//! Idle eviction, keep-alive, and explicit cleanup.

use grainpool::actor::ActorTag;
use grainpool::prelude::*;

use crate::support::run_local;

struct TestActor;

#[async_trait(?Send)]
impl VirtualActor for TestActor {
    async fn spawn(
        _id: &VirtualActorId,
        _dependency: SpawnDependency,
    ) -> std::result::Result<Self, VirtualActorError> {
        Ok(TestActor)
    }
}

fn short_timeout() -> IdleTimeoutSettings {
    IdleTimeoutSettings::new(Duration::from_millis(200), Duration::from_millis(500))
}

fn long_timeout() -> IdleTimeoutSettings {
    IdleTimeoutSettings::new(Duration::from_secs(60), Duration::from_secs(600))
}

#[test]
fn test_idle_timeout_removes_actor() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2550));

        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
            .replication_factor(10)
            .idle_timeout(short_timeout())
            .build();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("idle-timeout-remove");
        let _actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;

        let result = node.find_actor(&id, ActorTag::of::<TestActor>()).await;
        assert!(matches!(result, Err(VirtualActorError::ActorMissing)));
    });
}

#[test]
fn test_keep_alive_defers_eviction() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2551));

        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
            .replication_factor(10)
            .idle_timeout(short_timeout())
            .build();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("keep-alive");
        let actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        // Touch the actor before each sweep interval elapses; it must
        // outlive several timeout spans of wall time.
        for _ in 0..8 {
            tokio::time::sleep(Duration::from_millis(150)).await;
            plugin.mark_as_active(&actor).await;
        }

        let result = node.find_actor(&id, ActorTag::of::<TestActor>()).await;
        assert!(result.is_ok(), "kept-alive actor should stay reachable");
    });
}

#[test]
fn test_resign_removes_actor_from_node() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2552));

        // Lifecycle tracking on, but sweeps far in the future so only
        // the resignation can remove the actor.
        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
            .idle_timeout(long_timeout())
            .build();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("resigning");
        let actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        plugin.resign(&actor).await.unwrap();

        let result = node.find_actor(&id, ActorTag::of::<TestActor>()).await;
        assert!(matches!(result, Err(VirtualActorError::ActorMissing)));
    });
}

#[test]
fn test_termination_notification_cleans_actor() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2553));

        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
            .idle_timeout(long_timeout())
            .build();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("terminated");
        let actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        // The plugin layer receives the physical id from the host
        // runtime's termination watch and forwards it unchanged.
        plugin.clean_actor(actor.physical_id()).await.unwrap();

        let result = node.find_actor(&id, ActorTag::of::<TestActor>()).await;
        assert!(matches!(result, Err(VirtualActorError::ActorMissing)));

        // Duplicate notifications are no-ops.
        plugin.clean_actor(actor.physical_id()).await.unwrap();
    });
}

#[test]
fn test_clean_actor_without_mapping_is_noop() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2554));

        // Lifecycle tracking off: no reverse mapping is kept, so a
        // cleanup notification has nothing to translate and the actor
        // stays where it is.
        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::new();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("untracked");
        let actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        plugin.clean_actor(actor.physical_id()).await.unwrap();
        assert!(node
            .find_actor(&id, ActorTag::of::<TestActor>())
            .await
            .is_ok());
    });
}

#[test]
fn test_evicted_reference_stays_usable_for_in_progress_work() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let node = cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 2555));

        let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::builder()
            .replication_factor(10)
            .idle_timeout(short_timeout())
            .build();
        plugin.start(&cluster).await;

        let id = VirtualActorId::new("handed-out");
        let actor: VirtualActorRef<TestActor> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;

        // The node no longer knows the actor, but the reference the
        // caller already holds keeps the instance alive.
        assert!(matches!(
            node.find_actor(&id, ActorTag::of::<TestActor>()).await,
            Err(VirtualActorError::ActorMissing)
        ));
        let _still_here: &TestActor = &actor;
        assert_eq!(Rc::strong_count(actor.instance()), 1);
    });
}
