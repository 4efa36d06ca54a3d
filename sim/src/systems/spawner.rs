//! Unit creation and the periodic defender spawner.

use crate::components::*;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::events::{SimEvent, SimEventBuffer};
use crate::lanes::{LaneId, LaneRegistry, WaypointId};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, info, warn};

/// Seeded random number generator for reproducible spawning.
///
/// With a seed the same match setup always produces the same spawn sequence.
/// Without one, uses system entropy.
#[derive(Resource)]
pub struct GameRng {
    rng: StdRng,
    pub seed: Option<u64>,
}

impl GameRng {
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
        }
    }

    pub fn new(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::from_seed(seed),
            None => Self::from_entropy(),
        }
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    pub fn pick(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }
}

impl Default for GameRng {
    fn default() -> Self {
        Self::from_entropy()
    }
}

/// Hands out unit and structure ids. Ids are never reused within a match.
#[derive(Resource, Debug, Default)]
pub struct IdAllocator {
    next_unit: u32,
    next_structure: u32,
}

impl IdAllocator {
    pub fn unit(&mut self) -> UnitId {
        let id = UnitId(self.next_unit);
        self.next_unit += 1;
        id
    }

    pub fn structure(&mut self) -> StructureId {
        let id = StructureId(self.next_structure);
        self.next_structure += 1;
        id
    }
}

/// Everything needed to create one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSpec {
    pub faction: Faction,
    pub kind: UnitKind,
    pub waypoints: Vec<WaypointId>,
    pub start_index: usize,
    /// Inferred from the waypoints or position when absent.
    pub lane: Option<LaneId>,
    /// Defaults to the starting waypoint's position.
    pub position: Option<Position>,
    /// Fixed enemy structure. Resolved by lookup every tick when absent.
    pub structure: Option<StructureId>,
}

impl UnitSpec {
    pub fn new(faction: Faction, kind: UnitKind, waypoints: Vec<WaypointId>) -> Self {
        Self {
            faction,
            kind,
            waypoints,
            start_index: 0,
            lane: None,
            position: None,
            structure: None,
        }
    }

    pub fn start_at(mut self, index: usize) -> Self {
        self.start_index = index;
        self
    }

    pub fn on_lane(mut self, lane: LaneId) -> Self {
        self.lane = Some(lane);
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn targeting(mut self, structure: StructureId) -> Self {
        self.structure = Some(structure);
        self
    }
}

/// Lane for a unit created without one: the lane with exactly these
/// waypoints, else the lane nearest to `position`, else lane 0.
pub fn infer_lane(
    registry: &LaneRegistry,
    waypoints: &[WaypointId],
    position: &Position,
) -> LaneId {
    if let Some(lane) = registry.find_lane_by_waypoints(waypoints) {
        debug!(%lane, "lane matched by waypoints");
        return lane;
    }
    if let Some(lane) = registry.find_nearest_lane(position) {
        debug!(%lane, "lane assigned by nearest centroid");
        return lane;
    }
    warn!("no lane could be inferred, using lane 0");
    LaneId(0)
}

/// Validate a spec and build the unit's components.
pub fn prepare_unit(
    id: UnitId,
    spec: &UnitSpec,
    config: &SimConfig,
    registry: &LaneRegistry,
) -> SimResult<UnitBundle> {
    if spec.waypoints.is_empty() {
        return Err(SimError::EmptyWaypoints);
    }
    if spec.start_index >= spec.waypoints.len() {
        return Err(SimError::WaypointIndexOutOfRange {
            index: spec.start_index,
            len: spec.waypoints.len(),
        });
    }
    let stats = config.profile(spec.faction, spec.kind)?;
    let position = match spec.position {
        Some(p) => p,
        None => registry.resolve(spec.waypoints[spec.start_index])?,
    };
    let lane = match spec.lane {
        Some(lane) if registry.lane(lane).is_none() => return Err(SimError::UnknownLane(lane)),
        Some(lane) => lane,
        None => infer_lane(registry, &spec.waypoints, &position),
    };

    Ok(UnitBundle {
        id,
        faction: spec.faction,
        kind: spec.kind,
        stats,
        lane: OnLane(lane),
        position,
        vitality: Vitality::new(stats.max_health),
        state: UnitState::Moving,
        path: PathFollower::new(spec.waypoints.clone(), spec.start_index),
        timers: CombatTimers::default(),
        engagement: Engagement {
            target: None,
            structure: spec.structure,
        },
    })
}

/// Periodic defender spawner.
#[derive(Resource, Debug, Clone)]
pub struct SpawnScheduler {
    pub interval: f32,
    pub timer: f32,
    pub enabled: bool,
    /// Candidate lanes. Empty means every registered lane.
    pub lanes: Vec<LaneId>,
    pub last_lane: Option<LaneId>,
    /// Structure assigned to every spawned unit.
    pub target_structure: Option<StructureId>,
    pub reverse_path: bool,
}

impl Default for SpawnScheduler {
    fn default() -> Self {
        Self {
            interval: 5.0,
            timer: 0.0,
            enabled: true,
            lanes: Vec::new(),
            last_lane: None,
            target_structure: None,
            reverse_path: true,
        }
    }
}

impl SpawnScheduler {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            interval: config.spawn.interval,
            enabled: config.spawn.enabled,
            reverse_path: config.spawn.reverse_path,
            ..Self::default()
        }
    }

    /// Advance the timer. Returns `true` when a spawn is due.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.enabled {
            return false;
        }
        self.timer += dt;
        if self.timer >= self.interval {
            self.timer = 0.0;
            true
        } else {
            false
        }
    }

    /// Pick a lane at random, never the previous one when there is a choice.
    pub fn choose_lane(&mut self, registered: &[LaneId], rng: &mut GameRng) -> Option<LaneId> {
        let mut candidates: Vec<LaneId> = if self.lanes.is_empty() {
            registered.to_vec()
        } else {
            self.lanes.clone()
        };
        if candidates.len() > 1 {
            if let Some(last) = self.last_lane {
                candidates.retain(|l| *l != last);
            }
        }
        if candidates.is_empty() {
            return None;
        }
        let lane = candidates[rng.pick(candidates.len())];
        self.last_lane = Some(lane);
        Some(lane)
    }
}

/// System that spawns a random defender unit whenever the interval elapses.
#[allow(clippy::too_many_arguments)]
pub fn spawn_scheduler_system(
    dt: Res<DeltaTime>,
    config: Res<SimConfig>,
    registry: Res<LaneRegistry>,
    mut scheduler: ResMut<SpawnScheduler>,
    mut rng: ResMut<GameRng>,
    mut ids: ResMut<IdAllocator>,
    mut events: ResMut<SimEventBuffer>,
    mut commands: Commands,
) {
    if !scheduler.tick(dt.0) {
        return;
    }
    let Some(lane) = scheduler.choose_lane(&registry.lane_ids(), &mut rng) else {
        debug!("spawn due but no lanes registered");
        return;
    };
    let Some(lane_data) = registry.lane(lane) else {
        warn!(%lane, "spawner lane is not registered");
        return;
    };
    let mut waypoints = lane_data.waypoints.clone();
    if waypoints.is_empty() {
        warn!(%lane, "spawner lane has no waypoints");
        return;
    }
    if scheduler.reverse_path {
        waypoints.reverse();
    }

    let kind = UnitKind::ALL[rng.pick(UnitKind::ALL.len())];
    let start_index = rng.pick(waypoints.len());
    let mut spec = UnitSpec::new(Faction::Defender, kind, waypoints)
        .start_at(start_index)
        .on_lane(lane);
    spec.structure = scheduler.target_structure;

    let id = ids.unit();
    match prepare_unit(id, &spec, &config, &registry) {
        Ok(bundle) => {
            commands.spawn(bundle);
            info!(unit = %id, kind = kind.as_str(), %lane, start_index, "defender spawned");
            events.push(SimEvent::UnitSpawned {
                unit: id,
                faction: Faction::Defender,
                kind,
                lane,
            });
        }
        Err(err) => warn!(%lane, %err, "defender spawn failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_lanes(n: usize) -> LaneRegistry {
        let mut reg = LaneRegistry::new();
        for i in 0..n {
            let x = i as f32 * 10.0;
            reg.register_positions(&[
                Position::new(x, 0.0, 0.0),
                Position::new(x, 0.0, 10.0),
                Position::new(x, 0.0, 20.0),
            ]);
        }
        reg
    }

    #[test]
    fn test_lane_never_repeats() {
        let reg = registry_with_lanes(3);
        let mut scheduler = SpawnScheduler::default();
        let mut rng = GameRng::from_seed(42);
        let mut previous = None;
        for _ in 0..200 {
            let lane = scheduler.choose_lane(&reg.lane_ids(), &mut rng);
            assert!(lane.is_some());
            assert_ne!(lane, previous);
            previous = lane;
        }
    }

    #[test]
    fn test_single_lane_always_chosen() {
        let reg = registry_with_lanes(1);
        let mut scheduler = SpawnScheduler::default();
        let mut rng = GameRng::from_seed(1);
        for _ in 0..5 {
            assert_eq!(scheduler.choose_lane(&reg.lane_ids(), &mut rng), Some(LaneId(0)));
        }
        assert_eq!(scheduler.choose_lane(&[], &mut rng), None);
    }

    #[test]
    fn test_timer_fires_on_interval() {
        let mut scheduler = SpawnScheduler {
            interval: 1.0,
            ..SpawnScheduler::default()
        };
        assert!(!scheduler.tick(0.5));
        assert!(scheduler.tick(0.5));
        assert_eq!(scheduler.timer, 0.0);

        scheduler.enabled = false;
        assert!(!scheduler.tick(5.0));
    }

    #[test]
    fn test_prepare_unit_validates_path() {
        let reg = registry_with_lanes(1);
        let config = SimConfig::default();
        let empty = UnitSpec::new(Faction::Attacker, UnitKind::Tank, vec![]);
        assert!(matches!(
            prepare_unit(UnitId(0), &empty, &config, &reg),
            Err(SimError::EmptyWaypoints)
        ));

        let wps = reg.lane(LaneId(0)).unwrap().waypoints.clone();
        let out_of_range =
            UnitSpec::new(Faction::Attacker, UnitKind::Tank, wps.clone()).start_at(3);
        assert!(matches!(
            prepare_unit(UnitId(0), &out_of_range, &config, &reg),
            Err(SimError::WaypointIndexOutOfRange { index: 3, len: 3 })
        ));

        let ok = UnitSpec::new(Faction::Attacker, UnitKind::Archer, wps).start_at(1);
        let bundle = prepare_unit(UnitId(0), &ok, &config, &reg).unwrap();
        assert_eq!(bundle.position, Position::new(0.0, 0.0, 10.0));
        assert_eq!(bundle.lane, OnLane(LaneId(0)));
        assert_eq!(bundle.vitality.current(), 50);
        assert_eq!(bundle.path.index, 1);
    }

    #[test]
    fn test_lane_inference_falls_back_to_nearest() {
        let mut reg = registry_with_lanes(2);
        // A path that matches no registered lane, placed near lane 1.
        let stray = reg.add_waypoint(Position::new(11.0, 0.0, 10.0));
        assert_eq!(infer_lane(&reg, &[stray], &Position::new(11.0, 0.0, 10.0)), LaneId(1));

        let empty = LaneRegistry::new();
        assert_eq!(infer_lane(&empty, &[], &Position::default()), LaneId(0));
    }

    #[test]
    fn test_system_spawns_defender() {
        let mut world = World::new();
        let config = SimConfig {
            seed: Some(3),
            ..SimConfig::default()
        };
        world.insert_resource(DeltaTime(1.0));
        world.insert_resource(SpawnScheduler {
            interval: 2.0,
            ..SpawnScheduler::from_config(&config)
        });
        world.insert_resource(config);
        world.insert_resource(registry_with_lanes(2));
        world.insert_resource(GameRng::from_seed(3));
        world.insert_resource(IdAllocator::default());
        world.insert_resource(SimEventBuffer::default());

        let mut schedule = Schedule::default();
        schedule.add_systems(spawn_scheduler_system);

        schedule.run(&mut world);
        assert_eq!(world.query::<&UnitId>().iter(&world).count(), 0);
        schedule.run(&mut world);

        let mut query = world.query::<(&Faction, &OnLane, &UnitState)>();
        let spawned: Vec<_> = query.iter(&world).collect();
        assert_eq!(spawned.len(), 1);
        assert_eq!(*spawned[0].0, Faction::Defender);
        assert_eq!(*spawned[0].2, UnitState::Moving);
        assert_eq!(world.resource::<SimEventBuffer>().len(), 1);
    }
}
