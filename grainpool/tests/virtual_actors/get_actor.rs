//! Basic get-or-create behavior through the plugin surface.

use grainpool::prelude::*;

use crate::support::run_local;

struct Counter;

#[async_trait(?Send)]
impl VirtualActor for Counter {
    async fn spawn(
        _id: &VirtualActorId,
        _dependency: SpawnDependency,
    ) -> std::result::Result<Self, VirtualActorError> {
        Ok(Counter)
    }
}

struct Greeter {
    greeting: String,
}

#[async_trait(?Send)]
impl VirtualActor for Greeter {
    async fn spawn(
        _id: &VirtualActorId,
        dependency: SpawnDependency,
    ) -> std::result::Result<Self, VirtualActorError> {
        Ok(Greeter {
            greeting: dependency.take::<String>()?,
        })
    }
}

async fn started_plugin(
    cluster: &InMemoryCluster<VirtualNode>,
) -> VirtualActorsPlugin<VirtualNode> {
    let plugin: VirtualActorsPlugin<VirtualNode> = VirtualActorsPlugin::new();
    plugin.start(cluster).await;
    plugin
}

#[test]
fn test_get_actor_creates_then_finds() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
        let plugin = started_plugin(&cluster).await;

        let id = VirtualActorId::new("counter-a");
        let first: VirtualActorRef<Counter> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .expect("first call should create the actor");
        let second: VirtualActorRef<Counter> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .expect("second call should find the actor");

        assert_eq!(first.physical_id(), second.physical_id());
    });
}

#[test]
fn test_distinct_ids_get_distinct_instances() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
        let plugin = started_plugin(&cluster).await;

        let a: VirtualActorRef<Counter> = plugin
            .get_actor(&VirtualActorId::new("a"), SpawnDependency::none())
            .await
            .unwrap();
        let b: VirtualActorRef<Counter> = plugin
            .get_actor(&VirtualActorId::new("b"), SpawnDependency::none())
            .await
            .unwrap();

        assert_ne!(a.physical_id(), b.physical_id());
    });
}

#[test]
fn test_empty_ring_fails_no_nodes_available() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let plugin = started_plugin(&cluster).await;

        let result = plugin
            .get_actor::<Counter>(&VirtualActorId::new("nowhere"), SpawnDependency::none())
            .await;
        assert!(matches!(result, Err(VirtualActorError::NoNodesAvailable)));
    });
}

#[test]
fn test_second_type_for_same_id_is_type_mismatch() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
        let plugin = started_plugin(&cluster).await;

        let id = VirtualActorId::new("typed");
        let _counter: VirtualActorRef<Counter> = plugin
            .get_actor(&id, SpawnDependency::none())
            .await
            .unwrap();

        let result = plugin
            .get_actor::<Greeter>(&id, SpawnDependency::new("hello".to_string()))
            .await;
        assert!(matches!(result, Err(VirtualActorError::TypeMismatch { .. })));
    });
}

#[test]
fn test_spawn_dependency_is_delivered() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
        let plugin = started_plugin(&cluster).await;

        let greeter: VirtualActorRef<Greeter> = plugin
            .get_actor(
                &VirtualActorId::new("greeter"),
                SpawnDependency::new("bonjour".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(greeter.greeting, "bonjour");
    });
}

#[test]
fn test_spawn_dependency_type_mismatch_surfaces() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500));
        let plugin = started_plugin(&cluster).await;

        let result = plugin
            .get_actor::<Greeter>(
                &VirtualActorId::new("greeter-bad-dep"),
                SpawnDependency::new(42u32),
            )
            .await;
        assert!(matches!(
            result,
            Err(VirtualActorError::SpawnDependencyMismatch { .. })
        ));
    });
}

#[test]
fn test_actors_spread_across_nodes() {
    run_local(async {
        let cluster = InMemoryCluster::new();
        let nodes: Vec<VirtualNode> = (0..3)
            .map(|i| cluster.spawn_node(NodeAddress::tcp("127.0.0.1", 4500 + i)))
            .collect();
        let plugin = started_plugin(&cluster).await;

        for i in 0..100 {
            let _: VirtualActorRef<Counter> = plugin
                .get_actor(
                    &VirtualActorId::new(format!("spread-{i}")),
                    SpawnDependency::none(),
                )
                .await
                .unwrap();
        }

        let total: usize = nodes.iter().map(|n| n.actor_count()).sum();
        assert_eq!(total, 100);
        // With 100 virtual replicas per node, no node should sit empty.
        for node in &nodes {
            assert!(node.actor_count() > 0, "a node received zero actors");
        }
    });
}
