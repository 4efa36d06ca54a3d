//! Public API for the simulation.
//!
//! This module provides the main interface for a game client (or any other
//! host) to set up a match, drive it, and read its state back.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When `step(dt)` is called,
//! the simulation accumulates time and runs fixed updates as needed. This ensures deterministic
//! behavior regardless of frame rate.
//!
//! Once the match outcome is decided, time stops: `step` runs no further ticks
//! until `reset_match`.

use crate::components::*;
use crate::config::{SimConfig, SimTick};
use crate::error::{SimError, SimResult};
use crate::events::{DeathCause, SimEvent, SimEventBuffer};
use crate::lanes::{LaneId, LaneRegistry, WaypointId};
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use tracing::{debug, info, warn};

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Building lanes and structures
/// - Creating and placing units
/// - Stepping the simulation forward
/// - Extracting state snapshots and events
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    tick: u64,
    time: f32,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
}

impl SimWorld {
    /// Create a new empty simulation world.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    ///
    /// An unusable timestep is replaced by the default one.
    pub fn with_config(mut config: SimConfig) -> Self {
        if let Err(err) = config.validate() {
            let fallback = SimConfig::default().fixed_timestep;
            warn!(%err, fallback, "invalid timestep replaced");
            config.fixed_timestep = fallback;
        }
        let mut world = World::new();
        insert_core_resources(&mut world, config);

        Self {
            world,
            schedule: build_tick_schedule(),
            tick: 0,
            time: 0.0,
            time_accumulator: 0.0,
        }
    }

    /// Create a simulation world from a JSON configuration override.
    pub fn from_json_config(json: &str) -> SimResult<Self> {
        Ok(Self::with_config(SimConfig::from_json(json)?))
    }

    /// Create a demo match: three parallel lanes, one structure per side and
    /// an attacker of every kind.
    pub fn new_default_test_world() -> Self {
        let mut sim = Self::with_config(SimConfig {
            seed: Some(7),
            ..SimConfig::default()
        });

        for x in [-10.0, 0.0, 10.0] {
            sim.register_lane_points(&[
                Position::new(x, 0.0, 0.0),
                Position::new(x, 0.0, 20.0),
                Position::new(x, 0.0, 40.0),
            ]);
        }
        sim.spawn_structure(Faction::Attacker, Position::new(0.0, 0.0, -4.0), 500);
        sim.spawn_structure(Faction::Defender, Position::new(0.0, 0.0, 44.0), 500);

        for (i, kind) in UnitKind::ALL.into_iter().enumerate() {
            let lane = LaneId((i % 3) as u32);
            if let Err(err) = sim.create_unit(Faction::Attacker, kind, lane, 0) {
                warn!(%err, "demo unit not created");
            }
        }
        sim
    }

    // ------------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------------

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. This ensures deterministic behavior regardless of frame rate.
    ///
    /// Events raised by the ticks accumulate until `drain_events` is called.
    /// Hosts should drain after every step; the buffer keeps at most
    /// `MAX_BUFFERED_EVENTS`, dropping the oldest.
    pub fn step(&mut self, dt: f32) {
        if self.is_over() {
            self.time_accumulator = 0.0;
            return;
        }

        let fixed_dt = self.world.resource::<SimConfig>().fixed_timestep;

        // Accumulate time
        self.time_accumulator += dt;

        // Run fixed updates
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
            if self.is_over() {
                self.time_accumulator = 0.0;
                break;
            }
        }
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        self.world.resource_mut::<DeltaTime>().0 = dt;
        self.world.resource_mut::<SimTick>().increment();

        // Run all systems
        self.schedule.run(&mut self.world);

        self.tick += 1;
        self.time += dt;
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.time
    }

    pub fn config(&self) -> &SimConfig {
        self.world.resource::<SimConfig>()
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let axis = self.config().lane_axis;
        Snapshot::from_world(&mut self.world, self.tick, self.time, axis)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Take every event raised since the last call.
    pub fn drain_events(&mut self) -> Vec<SimEvent> {
        self.world.resource_mut::<SimEventBuffer>().drain()
    }

    // ------------------------------------------------------------------------
    // Lanes
    // ------------------------------------------------------------------------

    pub fn registry(&self) -> &LaneRegistry {
        self.world.resource::<LaneRegistry>()
    }

    pub fn add_waypoint(&mut self, position: Position) -> WaypointId {
        self.world.resource_mut::<LaneRegistry>().add_waypoint(position)
    }

    /// Remove a waypoint. Units whose path still needs it are disabled when
    /// they reach it.
    pub fn remove_waypoint(&mut self, id: WaypointId) -> SimResult<Position> {
        self.world
            .resource_mut::<LaneRegistry>()
            .remove_waypoint(id)
            .ok_or(SimError::UnknownWaypoint(id))
    }

    pub fn register_lane(&mut self, waypoints: Vec<WaypointId>) -> SimResult<LaneId> {
        let lane = self.world.resource_mut::<LaneRegistry>().register(waypoints)?;
        info!(%lane, "lane registered");
        Ok(lane)
    }

    /// Register fresh waypoints at `positions` and a lane through them.
    pub fn register_lane_points(&mut self, positions: &[Position]) -> LaneId {
        let lane = self.world.resource_mut::<LaneRegistry>().register_positions(positions);
        info!(%lane, waypoints = positions.len(), "lane registered");
        lane
    }

    pub fn deregister_lane(&mut self, lane: LaneId) -> SimResult<()> {
        self.world
            .resource_mut::<LaneRegistry>()
            .deregister(lane)
            .map(|_| ())
            .ok_or(SimError::UnknownLane(lane))
    }

    pub fn find_lane_by_waypoints(&self, waypoints: &[WaypointId]) -> Option<LaneId> {
        self.registry().find_lane_by_waypoints(waypoints)
    }

    pub fn find_nearest_lane(&self, position: &Position) -> Option<LaneId> {
        self.registry().find_nearest_lane(position)
    }

    // ------------------------------------------------------------------------
    // Structures
    // ------------------------------------------------------------------------

    /// Spawn a structure. `owner` loses the match when it falls.
    pub fn spawn_structure(
        &mut self,
        owner: Faction,
        position: Position,
        max_health: i32,
    ) -> StructureId {
        let id = self.world.resource_mut::<IdAllocator>().structure();
        self.world
            .spawn(StructureBundle::new(id, owner, position, max_health));
        info!(structure = %id, ?owner, "structure spawned");
        id
    }

    fn structure_entity(&mut self, id: StructureId) -> Option<Entity> {
        let mut query = self.world.query_filtered::<(Entity, &StructureId), With<Structure>>();
        query
            .iter(&self.world)
            .find(|(_, sid)| **sid == id)
            .map(|(e, _)| e)
    }

    pub fn remove_structure(&mut self, id: StructureId) -> SimResult<()> {
        let entity = self.structure_entity(id).ok_or(SimError::UnknownStructure(id))?;
        self.world.despawn(entity);
        Ok(())
    }

    /// The standing structure units of `faction` attack, if any.
    pub fn find_enemy_structure(&mut self, faction: Faction) -> Option<StructureId> {
        let mut query = self.world.query_filtered::<
            (Entity, &StructureId, &Faction, &Position, &Vitality),
            With<Structure>,
        >();
        let views: Vec<StructureView> = query
            .iter(&self.world)
            .map(|(entity, id, owner, position, vitality)| StructureView {
                entity,
                id: *id,
                owner: *owner,
                position: *position,
                standing: vitality.is_alive(),
            })
            .collect();
        find_enemy_structure(&views, faction).map(|v| v.id)
    }

    pub fn structure_health(&mut self, id: StructureId) -> Option<i32> {
        let entity = self.structure_entity(id)?;
        self.world.get::<Vitality>(entity).map(|v| v.current())
    }

    /// Damage a structure directly. Returns `true` if this destroyed it.
    pub fn damage_structure(&mut self, id: StructureId, amount: i32) -> SimResult<bool> {
        if amount < 0 {
            warn!(structure = %id, amount, "negative damage rejected");
            return Err(SimError::NegativeDamage(amount));
        }
        let entity = self.structure_entity(id).ok_or(SimError::UnknownStructure(id))?;
        let owner = *self
            .world
            .get::<Faction>(entity)
            .ok_or(SimError::UnknownStructure(id))?;
        let mut vitality = *self
            .world
            .get::<Vitality>(entity)
            .ok_or(SimError::UnknownStructure(id))?;

        let destroyed = self.world.resource_scope(|world, mut ctx: Mut<MatchContext>| {
            let mut events = world.resource_mut::<SimEventBuffer>();
            strike_structure(id, owner, &mut vitality, amount, &mut ctx, &mut events)
        });
        if let Some(mut stored) = self.world.get_mut::<Vitality>(entity) {
            *stored = vitality;
        }
        Ok(destroyed)
    }

    // ------------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------------

    /// Create a unit on `lane`, starting at waypoint `start_index`.
    ///
    /// Defenders walk the lane last-to-first when the spawn config says so.
    pub fn create_unit(
        &mut self,
        faction: Faction,
        kind: UnitKind,
        lane: LaneId,
        start_index: usize,
    ) -> SimResult<UnitId> {
        let spec = self.lane_spec(faction, kind, lane)?.start_at(start_index);
        self.spawn_unit(spec)
    }

    fn lane_spec(&self, faction: Faction, kind: UnitKind, lane: LaneId) -> SimResult<UnitSpec> {
        let mut waypoints = self
            .registry()
            .lane(lane)
            .ok_or(SimError::UnknownLane(lane))?
            .waypoints
            .clone();
        if faction == Faction::Defender && self.config().spawn.reverse_path {
            waypoints.reverse();
        }
        Ok(UnitSpec::new(faction, kind, waypoints).on_lane(lane))
    }

    /// Create a unit from a full spec.
    pub fn spawn_unit(&mut self, spec: UnitSpec) -> SimResult<UnitId> {
        let id = self.world.resource_mut::<IdAllocator>().unit();
        let bundle = prepare_unit(id, &spec, self.config(), self.registry())?;
        self.insert_unit(bundle);
        Ok(id)
    }

    fn insert_unit(&mut self, bundle: UnitBundle) {
        let (id, faction, kind, lane) = (bundle.id, bundle.faction, bundle.kind, bundle.lane.0);
        self.world.spawn(bundle);
        info!(unit = %id, ?faction, kind = kind.as_str(), %lane, "unit spawned");
        self.world.resource_mut::<SimEventBuffer>().push(SimEvent::UnitSpawned {
            unit: id,
            faction,
            kind,
            lane,
        });
    }

    /// Player placement: spend the kind's energy cost and create an attacker
    /// at the start of `lane`.
    ///
    /// Returns `Ok(None)` when energy is short or the match is over; nothing
    /// is spent in either case.
    pub fn place_unit(&mut self, kind: UnitKind, lane: LaneId) -> SimResult<Option<UnitId>> {
        if self.is_over() {
            return Ok(None);
        }
        let spec = self.lane_spec(Faction::Attacker, kind, lane)?;
        let cost = self.config().economy.placement_costs.cost(kind);
        // Validate before spending so a bad lane never costs energy.
        let id = UnitId(u32::MAX);
        prepare_unit(id, &spec, self.config(), self.registry())?;

        if !self.world.resource_mut::<MatchContext>().try_spend(cost)? {
            debug!(kind = kind.as_str(), cost, "not enough energy to place unit");
            return Ok(None);
        }
        self.spawn_unit(spec).map(Some)
    }

    fn unit_entity(&mut self, id: UnitId) -> Option<Entity> {
        let mut query = self.world.query_filtered::<(Entity, &UnitId), Without<Structure>>();
        query
            .iter(&self.world)
            .find(|(_, uid)| **uid == id)
            .map(|(e, _)| e)
    }

    /// Damage a unit directly. A killing hit removes the unit at once.
    pub fn damage_unit(&mut self, id: UnitId, amount: i32) -> SimResult<DamageOutcome> {
        let entity = self.unit_entity(id).ok_or(SimError::UnknownUnit(id))?;
        let faction = *self.world.get::<Faction>(entity).ok_or(SimError::UnknownUnit(id))?;
        let outcome = self
            .world
            .get_mut::<Vitality>(entity)
            .ok_or(SimError::UnknownUnit(id))?
            .take_damage(amount)?;

        let remaining = match outcome {
            DamageOutcome::Applied { remaining } => remaining,
            DamageOutcome::Killed => 0,
        };
        self.world.resource_mut::<SimEventBuffer>().push(SimEvent::UnitDamaged {
            unit: id,
            amount,
            remaining,
        });
        if outcome == DamageOutcome::Killed {
            self.world.resource_mut::<SimEventBuffer>().push(SimEvent::UnitDied {
                unit: id,
                faction,
                cause: DeathCause::Killed,
            });
            self.world.despawn(entity);
            debug!(unit = %id, "unit killed");
        }
        Ok(outcome)
    }

    pub fn unit_health(&mut self, id: UnitId) -> Option<i32> {
        let entity = self.unit_entity(id)?;
        self.world.get::<Vitality>(entity).map(|v| v.current())
    }

    pub fn unit_state(&mut self, id: UnitId) -> Option<UnitState> {
        let entity = self.unit_entity(id)?;
        self.world.get::<UnitState>(entity).copied()
    }

    pub fn unit_position(&mut self, id: UnitId) -> Option<Position> {
        let entity = self.unit_entity(id)?;
        self.world.get::<Position>(entity).copied()
    }

    pub fn unit_lane(&mut self, id: UnitId) -> Option<LaneId> {
        let entity = self.unit_entity(id)?;
        self.world.get::<OnLane>(entity).map(|l| l.0)
    }

    pub fn is_unit_alive(&mut self, id: UnitId) -> bool {
        self.unit_health(id).is_some_and(|h| h > 0)
    }

    /// Number of live units.
    pub fn unit_count(&mut self) -> usize {
        let mut query = self.world.query_filtered::<&UnitId, Without<Structure>>();
        query.iter(&self.world).count()
    }

    /// Replace a unit's path. The unit restarts at the first waypoint in
    /// Moving state; its lane follows the path when the path is a registered lane.
    pub fn set_waypoints(&mut self, id: UnitId, waypoints: Vec<WaypointId>) -> SimResult<()> {
        if waypoints.is_empty() {
            return Err(SimError::EmptyWaypoints);
        }
        if let Some(missing) = waypoints.iter().find(|w| self.registry().waypoint(**w).is_none()) {
            return Err(SimError::UnknownWaypoint(*missing));
        }
        let entity = self.unit_entity(id).ok_or(SimError::UnknownUnit(id))?;
        let lane = self.registry().find_lane_by_waypoints(&waypoints);

        let mut unit = self.world.entity_mut(entity);
        if let Some(mut path) = unit.get_mut::<PathFollower>() {
            *path = PathFollower::new(waypoints, 0);
        }
        if let Some(mut state) = unit.get_mut::<UnitState>() {
            *state = UnitState::Moving;
        }
        if let Some(mut engagement) = unit.get_mut::<Engagement>() {
            engagement.target = None;
        }
        if let Some(mut timers) = unit.get_mut::<CombatTimers>() {
            timers.engagement = 0.0;
        }
        if let Some(lane) = lane {
            unit.insert(OnLane(lane));
        }
        debug!(unit = %id, ?lane, "waypoints replaced");
        Ok(())
    }

    /// Start the unit's path at waypoint `index`. Out-of-range indices are
    /// rejected without touching the unit.
    pub fn set_starting_waypoint_index(&mut self, id: UnitId, index: usize) -> SimResult<()> {
        let entity = self.unit_entity(id).ok_or(SimError::UnknownUnit(id))?;
        let mut path = self
            .world
            .get_mut::<PathFollower>(entity)
            .ok_or(SimError::UnknownUnit(id))?;
        if index >= path.waypoints.len() {
            return Err(SimError::WaypointIndexOutOfRange {
                index,
                len: path.waypoints.len(),
            });
        }
        path.index = index;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Match
    // ------------------------------------------------------------------------

    pub fn energy(&self) -> f32 {
        self.world.resource::<MatchContext>().energy()
    }

    pub fn max_energy(&self) -> f32 {
        self.world.resource::<MatchContext>().max_energy()
    }

    pub fn try_spend(&mut self, amount: i32) -> SimResult<bool> {
        self.world.resource_mut::<MatchContext>().try_spend(amount)
    }

    pub fn upgrade_capacity(&mut self) -> SimResult<bool> {
        self.world.resource_mut::<MatchContext>().upgrade_capacity()
    }

    pub fn upgrade_cost(&self) -> i32 {
        self.world.resource::<MatchContext>().upgrade_cost()
    }

    pub fn outcome(&self) -> Option<MatchOutcome> {
        self.world.resource::<MatchContext>().outcome()
    }

    pub fn is_over(&self) -> bool {
        self.world.resource::<MatchContext>().is_over()
    }

    /// Decide the match from outside the simulation. Only the first call counts.
    pub fn game_over(&mut self, victory: bool) -> bool {
        let decided = self.world.resource_mut::<MatchContext>().game_over(victory);
        if decided {
            self.world
                .resource_mut::<SimEventBuffer>()
                .push(SimEvent::GameOver { victory });
        }
        decided
    }

    /// Restore energy and clear the outcome so play can resume.
    pub fn reset_match(&mut self) {
        self.world.resource_mut::<MatchContext>().reset();
        self.time_accumulator = 0.0;
        info!("match reset");
    }

    // ------------------------------------------------------------------------
    // Spawner
    // ------------------------------------------------------------------------

    /// Restrict spawning to `lanes` (empty means every lane) and optionally
    /// pin the structure spawned units attack.
    pub fn configure_spawner(&mut self, lanes: Vec<LaneId>, target: Option<StructureId>) {
        let mut scheduler = self.world.resource_mut::<SpawnScheduler>();
        scheduler.lanes = lanes;
        scheduler.target_structure = target;
    }

    pub fn set_spawning(&mut self, enabled: bool) {
        self.world.resource_mut::<SpawnScheduler>().enabled = enabled;
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}
