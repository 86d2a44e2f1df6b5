use crate::model::error::SimulationError;
use crate::model::events::{ConservationWarning, LatticeEvent, TickReport};
use crate::model::flux;
use crate::model::forces::{self, accumulate, sample_all};
use crate::model::manifestation::{self, AnnihilationRecord};
use crate::model::motion::{consume_step, integrate_velocity, plan_moves, zero_axes};
use crate::model::phase::Phase;
use crate::model::world::World;
use std::time::Instant;
use trilattice_data::{Coord, Vec3};

impl World {
    /// Advances the lattice by one tick.
    ///
    /// Runs every phase of [`Phase::ORDER`] in sequence. If propagation
    /// diverges the tick is abandoned with [`SimulationError::Instability`];
    /// the tick counter is left unchanged and
    /// [`World::sanitize_non_finite`] can be used to recover.
    pub fn step(&mut self) -> Result<TickReport, SimulationError> {
        let started = Instant::now();
        let mut report = TickReport::new(self.tick);
        for phase in Phase::ORDER {
            self.run_phase(phase, &mut report)?;
        }
        self.metrics.record_tick(
            started.elapsed(),
            report.stored,
            report.manifested,
            self.config.run.report_interval,
        );
        Ok(report)
    }

    /// Runs a single phase. Phases after the first read the working data
    /// earlier phases of the same tick left behind, so running them out of
    /// order changes the result.
    pub fn run_phase(&mut self, phase: Phase, report: &mut TickReport) -> Result<(), SimulationError> {
        match phase {
            Phase::Gating => self.phase_gating(report),
            Phase::Decay => self.phase_decay(),
            Phase::Existence => self.phase_existence(report),
            Phase::Propagation => self.phase_propagation()?,
            Phase::Fields => self.phase_fields(),
            Phase::Forces => self.phase_forces(),
            Phase::Velocity => self.phase_velocity(),
            Phase::Remainder => self.phase_remainder(),
            Phase::Movement => self.phase_movement(report),
            Phase::Transmutation => self.phase_transmutation(report),
            Phase::Binding => self.phase_binding(report),
            Phase::Advance => self.phase_advance(report),
        }
        Ok(())
    }

    fn phase_gating(&mut self, report: &mut TickReport) {
        self.scratch.clear();
        let k_b = self.config.manifestation.threshold;
        let coupling = self.config.gating.clock_coupling;
        for c in self.lattice.manifested_coords() {
            let Some(v) = self.lattice.get_mut(c) else {
                continue;
            };
            v.clock += 1.0 / (1.0 + coupling * v.density() / k_b);
            if v.clock >= 1.0 {
                v.clock -= 1.0;
                self.scratch.gated.insert(c);
            }
        }
        report.gated = self.scratch.gated.len();
    }

    fn phase_decay(&mut self) {
        let decayed = manifestation::decay(&mut self.lattice, self.config.manifestation.decay_factor);
        tracing::trace!(decayed, "Decay applied");
    }

    fn phase_existence(&mut self, report: &mut TickReport) {
        let outcome = manifestation::resolve_existence(
            &mut self.lattice,
            &self.config.manifestation,
            &mut self.rng,
        );
        let tick = self.tick;

        self.record_annihilations(&outcome.annihilations, Phase::Existence, report);
        for (coord, id) in &outcome.evaporated {
            report.push(LatticeEvent::Evaporation {
                coord: *coord,
                id: *id,
                tick,
            });
        }
        for (coord, state, id) in &outcome.genesis {
            report.push(LatticeEvent::Genesis {
                coord: *coord,
                id: *id,
                state: *state,
                tick,
            });
        }
        self.metrics
            .increment_counter("evaporation", outcome.evaporated.len() as u64);
        self.metrics
            .increment_counter("genesis", outcome.genesis.len() as u64);
    }

    fn phase_propagation(&mut self) -> Result<(), SimulationError> {
        let outcome = flux::propagate(&mut self.lattice, &self.config.flux);
        if outcome.non_finite.is_empty() {
            return Ok(());
        }
        tracing::warn!(
            tick = self.tick,
            count = outcome.non_finite.len(),
            "Flux propagation produced non-finite values"
        );
        Err(SimulationError::Instability {
            tick: self.tick,
            coords: outcome.non_finite,
        })
    }

    fn phase_fields(&mut self) {
        let coords = self.lattice.manifested_coords();
        self.scratch.fields = sample_all(&self.lattice, &coords);
    }

    fn phase_forces(&mut self) {
        self.scratch.forces = accumulate(&self.lattice, &self.scratch.fields, &self.config.forces);
    }

    /// Gated voxels that are still manifested, in coordinate order.
    fn gated_movers(&self) -> Vec<Coord> {
        self.scratch
            .gated
            .iter()
            .copied()
            .filter(|c| self.lattice.get(*c).is_some_and(|v| v.is_manifested()))
            .collect()
    }

    fn phase_velocity(&mut self) {
        let mass = self.config.motion.mass_proxy;
        let limit = self.config.motion.speed_limit;
        for c in self.gated_movers() {
            let force = self.scratch.forces.get(&c).copied().unwrap_or(Vec3::ZERO);
            if let Some(v) = self.lattice.get_mut(c) {
                v.velocity = integrate_velocity(v.velocity, force, mass, limit);
            }
        }
    }

    fn phase_remainder(&mut self) {
        for c in self.gated_movers() {
            if let Some(v) = self.lattice.get_mut(c) {
                v.remainder += v.velocity;
            }
        }
    }

    fn phase_movement(&mut self, report: &mut TickReport) {
        let tick = self.tick;
        let movers = self.gated_movers();
        let plan = plan_moves(&self.lattice, &movers);
        if plan.is_empty() {
            return;
        }

        for reflection in &plan.reflections {
            if let Some(v) = self.lattice.get_mut(reflection.coord) {
                for (axis, hit) in reflection.axes.iter().enumerate() {
                    if *hit {
                        v.velocity.set_component(axis, -v.velocity.component(axis));
                        v.remainder.set_component(axis, 0.0);
                    }
                }
            }
            report.push(LatticeEvent::Reflected {
                coord: reflection.coord,
                axes: reflection.axes,
                tick,
            });
        }

        for coord in &plan.exits {
            if let Some(v) = self.lattice.remove(*coord) {
                if let Some(pid) = v.partner_id {
                    self.clear_partner(pid);
                }
                report.push(LatticeEvent::Exited {
                    id: v.id,
                    coord: *coord,
                    tick,
                });
            }
        }

        let records = manifestation::annihilate(&mut self.lattice, &plan.annihilations);
        self.record_annihilations(&records, Phase::Movement, report);

        for collision in &plan.elastic {
            let mover_velocity = self.lattice.get(collision.mover).map(|v| v.velocity);
            let target_velocity = self.lattice.get(collision.target).map(|v| v.velocity);
            let (Some(a), Some(b)) = (mover_velocity, target_velocity) else {
                continue;
            };
            if let Some(v) = self.lattice.get_mut(collision.mover) {
                v.velocity = b;
                zero_axes(&mut v.remainder, collision.step);
            }
            if let Some(v) = self.lattice.get_mut(collision.target) {
                v.velocity = a;
            }
            report.push(LatticeEvent::ElasticCollision {
                mover: collision.mover,
                target: collision.target,
                tick,
            });
        }

        for (coord, step) in &plan.blocked {
            if let Some(v) = self.lattice.get_mut(*coord) {
                zero_axes(&mut v.velocity, *step);
                zero_axes(&mut v.remainder, *step);
            }
            let target = self.lattice.resolve(*coord + *step).unwrap_or(*coord);
            report.push(LatticeEvent::Blocked {
                coord: *coord,
                target,
                tick,
            });
        }
        for (coord, step) in &plan.stalled {
            if let Some(v) = self.lattice.get_mut(*coord) {
                zero_axes(&mut v.remainder, *step);
            }
        }

        // Lift every mover first so no id is ever indexed at two sites.
        let lifted: Vec<_> = plan
            .moves
            .iter()
            .filter_map(|order| self.lattice.remove(order.source).map(|v| (*order, v)))
            .collect();
        for (order, mut voxel) in lifted {
            voxel.remainder = consume_step(voxel.remainder, order.step);
            if let Some(field) = self.lattice.get(order.target) {
                voxel.flux += field.flux;
                voxel.flux_rate += field.flux_rate;
            }
            let id = voxel.id;
            match self.lattice.set(order.target, voxel) {
                Ok(_) => report.push(LatticeEvent::Moved {
                    id,
                    from: order.source,
                    to: order.target,
                    tick,
                }),
                Err(e) => tracing::error!(error = %e, source = %order.source, "Move could not be applied"),
            }
        }

        self.metrics
            .increment_counter("moves", plan.moves.len() as u64);
        self.metrics
            .increment_counter("elastic_collisions", plan.elastic.len() as u64);
    }

    fn phase_transmutation(&mut self, report: &mut TickReport) {
        let Some(threshold) = self.config.forces.stress_threshold else {
            return;
        };
        for t in forces::transmute(&mut self.lattice, threshold) {
            report.push(LatticeEvent::Transmuted {
                coord: t.coord,
                id: t.id,
                from: t.from,
                to: t.to,
                stress: t.stress,
                tick: self.tick,
            });
        }
    }

    fn phase_binding(&mut self, report: &mut TickReport) {
        let outcome = self
            .bindings
            .update(&mut self.lattice, self.config.binding.persistence_ticks);
        let ids = |key: &[(Coord, uuid::Uuid); 3]| [key[0].1, key[1].1, key[2].1];
        for key in &outcome.formed {
            report.push(LatticeEvent::BindingFormed {
                members: ids(key),
                tick: self.tick,
            });
        }
        for key in &outcome.broken {
            report.push(LatticeEvent::BindingBroken {
                members: ids(key),
                tick: self.tick,
            });
        }
    }

    fn phase_advance(&mut self, report: &mut TickReport) {
        self.tick += 1;
        report.stored = self.lattice.len();
        report.manifested = self.lattice.manifested_coords().len();
    }

    fn record_annihilations(
        &mut self,
        records: &[AnnihilationRecord],
        phase: Phase,
        report: &mut TickReport,
    ) {
        let tolerance = self.config.diagnostics.conservation_tolerance;
        for record in records {
            report.push(LatticeEvent::Annihilation {
                positive: record.positive,
                negative: record.negative,
                magnitude: record.magnitude,
                recipients: record.recipients.len(),
                phase,
                tick: self.tick,
            });
            if !record.is_conserved(tolerance) {
                tracing::warn!(
                    tick = self.tick,
                    %phase,
                    expected = record.magnitude,
                    deposited = record.deposited,
                    "Annihilation did not conserve flux magnitude"
                );
                report.conservation_warnings.push(ConservationWarning {
                    phase,
                    positive: record.positive,
                    negative: record.negative,
                    expected: record.magnitude,
                    deposited: record.deposited,
                });
            }
        }
        self.metrics
            .increment_counter("annihilation", records.len() as u64);
    }
}
