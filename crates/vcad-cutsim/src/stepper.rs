//! Toolpath stepping and material removal.
//!
//! Every motion command is cut into substeps no longer than the configured
//! simulation step (rapids always take five). Each substep moves the tool,
//! turns the workpiece by its share of the rotary motion, subtracts the tool
//! from the workpiece and records a [`ToolpathFrame`].

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use vcad_cutsim_gcode::{solve_arc, ArcSolution, MotionCommand, MotionMode, Pose, Program};

use crate::config::{SimulationConfig, SimulationMode};
use crate::csg;
use crate::decimate::simplify;
use crate::error::{Result, SimError};
use crate::export::ArtifactSink;
use crate::frame::{CutStatus, CuttingTable, ToolpathFrame};
use crate::mesh::TriMesh;
use crate::metrics::{cut_metrics, SubstepMotion};
use crate::plant::PlantModel;
use crate::progress::{
    CancelToken, ProgressCounter, ProgressSink, ProgressTracker, PROGRESS_MAX,
};
use crate::setup::{fixture_tool, fixture_workpiece, Fixture};
use crate::transform::Transform;

/// Substeps used for every rapid move.
pub const RAPID_SUBSTEPS: usize = 5;

/// Workpiece and tool as they were after one substep.
#[derive(Debug, Clone)]
pub struct MeshSnapshot {
    /// Workpiece mesh.
    pub workpiece: Arc<TriMesh>,
    /// Tool mesh.
    pub tool: Arc<TriMesh>,
}

/// A command that could not be simulated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    /// 1-based G-code line.
    pub line: usize,
    /// Error text.
    pub message: String,
}

/// Summary of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Commands handled, including failed ones.
    pub commands: usize,
    /// Frames produced.
    pub substeps: usize,
    /// Frames that removed material.
    pub cut_frames: usize,
    /// Frames with no contact.
    pub air_frames: usize,
    /// Frames whose Boolean operation failed.
    pub unavailable_frames: usize,
    /// Commands skipped because of an error.
    pub failures: Vec<RunFailure>,
    /// The run stopped early on request.
    pub cancelled: bool,
    /// Set when exporting the results failed.
    pub export_error: Option<String>,
}

impl RunReport {
    /// True if every command ran and nothing failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
            && !self.cancelled
            && self.export_error.is_none()
            && self.unavailable_frames == 0
    }
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// One frame per substep, in order.
    pub frames: Vec<ToolpathFrame>,
    /// One mesh pair per substep when snapshots are enabled.
    pub snapshots: Vec<MeshSnapshot>,
    /// Workpiece after the last substep.
    pub workpiece: Arc<TriMesh>,
    /// Tool after the last substep.
    pub tool: Arc<TriMesh>,
    /// Run summary.
    pub report: RunReport,
}

impl SimulationOutput {
    /// The cutting-parameter table.
    pub fn table(&self) -> CuttingTable {
        CuttingTable::from_frames(&self.frames)
    }

    /// Hand the final workpiece and table to `sink`.
    ///
    /// A failure is also recorded in the report; frames and meshes are kept.
    pub fn export(&mut self, sink: &mut dyn ArtifactSink) -> Result<()> {
        let result = sink.export(&self.workpiece, &self.table());
        if let Err(err) = &result {
            error!(%err, "export failed");
            self.report.export_error = Some(err.to_string());
        }
        result
    }
}

/// A configured machine: workpiece, tool, tool library and settings.
///
/// Runs never modify the simulation, so the same instance can be run
/// repeatedly with identical results.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    workpiece: Arc<TriMesh>,
    tool: Arc<TriMesh>,
    tool_library: HashMap<String, TriMesh>,
    c_center: Point3<f64>,
    a_center: Point3<f64>,
}

impl Simulation {
    /// Use meshes that are already in machine coordinates.
    pub fn new(workpiece: TriMesh, tool: TriMesh, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let (c_center, a_center) = config.rotary.resolve_centers(&workpiece);
        Ok(Self {
            config,
            workpiece: Arc::new(workpiece),
            tool: Arc::new(tool),
            tool_library: HashMap::new(),
            c_center,
            a_center,
        })
    }

    /// Fixture both meshes the way the machine is set up (see
    /// [`fixture_workpiece`] and [`fixture_tool`]).
    pub fn fixtured(workpiece: &TriMesh, tool: &TriMesh, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let Fixture {
            workpiece,
            c_center,
            a_center,
        } = fixture_workpiece(workpiece, &config)?;
        let tool = fixture_tool(tool, &config)?;
        Ok(Self {
            config,
            workpiece: Arc::new(workpiece),
            tool: Arc::new(tool),
            tool_library: HashMap::new(),
            c_center,
            a_center,
        })
    }

    /// Register the mesh loaded when a command switches to `tool_id`.
    pub fn with_tool(mut self, tool_id: impl Into<String>, mesh: &TriMesh) -> Result<Self> {
        let tool = fixture_tool(mesh, &self.config)?;
        self.tool_library.insert(tool_id.into(), tool);
        Ok(self)
    }

    /// Settings.
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Initial workpiece.
    pub fn workpiece(&self) -> &TriMesh {
        &self.workpiece
    }

    /// Initial tool.
    pub fn tool(&self) -> &TriMesh {
        &self.tool
    }

    /// C and A rotation centers.
    pub fn centers(&self) -> (Point3<f64>, Point3<f64>) {
        (self.c_center, self.a_center)
    }

    /// Simulate a parsed program.
    pub fn run_program(
        &self,
        program: &Program,
        progress: &mut dyn ProgressSink,
        cancel: Option<&CancelToken>,
    ) -> SimulationOutput {
        self.run(&program.commands, progress, cancel)
    }

    /// Simulate `commands` in order.
    ///
    /// A command that cannot be executed is recorded in the report and
    /// skipped. `cancel` is checked before each command.
    pub fn run(
        &self,
        commands: &[MotionCommand],
        progress: &mut dyn ProgressSink,
        cancel: Option<&CancelToken>,
    ) -> SimulationOutput {
        let mut tracker = ProgressTracker::new(progress);
        let share = if commands.is_empty() {
            0.0
        } else {
            PROGRESS_MAX / commands.len() as f64
        };
        let mut run = Run::new(self);
        info!(
            commands = commands.len(),
            mode = ?self.config.mode,
            step = self.config.simulation_step,
            "simulation started"
        );

        for command in commands {
            if cancel.is_some_and(CancelToken::is_cancelled) {
                warn!(line = command.line_number, "simulation cancelled");
                run.report.cancelled = true;
                break;
            }
            match run.plan(command) {
                Ok(plan) => run.execute(&plan, share, &mut tracker),
                Err(err) => {
                    error!(line = command.line_number, %err, "command skipped");
                    run.report.failures.push(RunFailure {
                        line: command.line_number,
                        message: err.to_string(),
                    });
                    tracker.advance(share);
                }
            }
            run.report.commands += 1;
        }

        tracker.finish();
        let output = run.finish();
        let report = &output.report;
        info!(
            substeps = report.substeps,
            cut = report.cut_frames,
            air = report.air_frames,
            unavailable = report.unavailable_frames,
            failures = report.failures.len(),
            "simulation finished"
        );
        output
    }
}

/// A command resolved into substeps.
struct MovePlan<'c> {
    command: &'c MotionCommand,
    start: Pose,
    arc: Option<ArcSolution>,
    substeps: usize,
    /// Path length of one substep.
    length: f64,
    /// Machining time of one substep.
    dt: f64,
}

/// Mutable state of one run.
struct Run<'s> {
    sim: &'s Simulation,
    pose: Pose,
    workpiece: Arc<TriMesh>,
    tool: Arc<TriMesh>,
    active_tool: Option<String>,
    plant: PlantModel,
    elapsed: f64,
    frames: Vec<ToolpathFrame>,
    snapshots: Vec<MeshSnapshot>,
    report: RunReport,
}

impl<'s> Run<'s> {
    fn new(sim: &'s Simulation) -> Self {
        Self {
            sim,
            pose: Pose::default(),
            workpiece: Arc::clone(&sim.workpiece),
            tool: Arc::clone(&sim.tool),
            active_tool: None,
            plant: PlantModel::new(),
            elapsed: 0.0,
            frames: Vec::new(),
            snapshots: Vec::new(),
            report: RunReport::default(),
        }
    }

    fn plan<'c>(&self, command: &'c MotionCommand) -> Result<MovePlan<'c>> {
        let line = command.line_number;
        let invalid = |reason: String| SimError::InvalidCommand { line, reason };
        if !command.target.is_finite() {
            return Err(invalid(format!("target {:?} is not finite", command.target)));
        }
        if !(command.feed.is_finite() && command.spindle_speed.is_finite()) {
            return Err(invalid(format!(
                "feed {} / spindle speed {} is not finite",
                command.feed, command.spindle_speed
            )));
        }

        let config = &self.sim.config;
        let start = self.pose;
        let (from, to) = (start.position(), command.target.position());
        let arc = match (command.mode.arc_direction(), &command.arc) {
            (Some(direction), Some(params)) => {
                Some(solve_arc(&from, &to, direction, params)).filter(|a| !a.degenerates_to_linear())
            }
            _ => None,
        };
        let translation = match &arc {
            Some(arc) => arc.helical_length(&from, &to),
            None => (to - from).norm(),
        };
        let (c_travel, a_travel) = self.rotary_travel(&start, &command.target);
        let effective = translation.max(c_travel).max(a_travel);

        let mut plan = MovePlan {
            command,
            start,
            arc,
            substeps: 0,
            length: 0.0,
            dt: 0.0,
        };
        if effective == 0.0 {
            return Ok(plan);
        }

        plan.substeps = if command.mode == MotionMode::Rapid {
            RAPID_SUBSTEPS
        } else {
            let count = (effective / config.simulation_step).ceil();
            if count > config.max_substeps as f64 {
                return Err(invalid(format!(
                    "{effective:.3} mm of travel needs {count} substeps, limit is {}",
                    config.max_substeps
                )));
            }
            (count as usize).max(1)
        };
        plan.length = effective / plan.substeps as f64;

        let rate = if command.mode == MotionMode::Rapid {
            config.rapid_rate
        } else if command.feed > 0.0 {
            command.feed
        } else {
            warn!(line, feed = command.feed, "no feed rate, timing move at rapid rate");
            config.rapid_rate
        };
        plan.dt = plan.length / (rate / 60.0);
        Ok(plan)
    }

    /// Arc length swept by the workpiece surface for the C and A moves.
    fn rotary_travel(&self, start: &Pose, target: &Pose) -> (f64, f64) {
        let Some(bounds) = self.workpiece.bounds() else {
            return (0.0, 0.0);
        };
        let centroid = self.workpiece.centroid();
        let radius_c = (Point3::new(bounds.max.x, centroid.y, centroid.z) - self.sim.c_center).norm();
        let radius_a = (Point3::new(centroid.x, centroid.y, bounds.max.z) - self.sim.a_center).norm();
        (
            radius_c * (target.c - start.c).abs().to_radians(),
            radius_a * (target.a - start.a).abs().to_radians(),
        )
    }

    fn execute(&mut self, plan: &MovePlan<'_>, share: f64, tracker: &mut ProgressTracker<'_>) {
        let command = plan.command;
        self.change_tool(command);

        if plan.substeps == 0 {
            debug!(line = command.line_number, "command has no motion");
            self.pose = command.target;
            tracker.advance(share);
            return;
        }

        let (c_center, a_center) = (self.sim.c_center, self.sim.a_center);
        let n = plan.substeps as f64;
        let from = plan.start.position();
        let to = command.target.position();
        let c_step = (command.target.c - plan.start.c) / n;
        let a_step = (command.target.a - plan.start.a) / n;
        // C is applied before A.
        let rotation = Transform::a_axis(a_step, &a_center).then(&Transform::c_axis(c_step, &c_center));

        for i in 1..=plan.substeps {
            let pose = if i == plan.substeps {
                command.target
            } else {
                let fraction = i as f64 / n;
                let position = match &plan.arc {
                    Some(arc) => arc.point_at(fraction, &from, &to),
                    None => from + (to - from) * fraction,
                };
                plan.start.lerp(&command.target, fraction).with_position(&position)
            };
            let tool_step = pose.position() - self.pose.position();
            self.pose = pose;

            self.move_tool(&tool_step, command.spindle_speed, plan.dt);
            if !rotation.is_identity() {
                self.workpiece = Arc::new(self.workpiece.transformed(&rotation));
            }
            self.elapsed += plan.dt;

            let motion = SubstepMotion {
                tool_step,
                c_step,
                a_step,
                c_center,
                a_center,
                length: plan.length,
            };
            let frame = self.remove_material(command, &motion);
            self.record(frame);
            tracker.advance(share / n);
        }
    }

    fn change_tool(&mut self, command: &MotionCommand) {
        if command.tool_id == self.active_tool {
            return;
        }
        if let Some(id) = &command.tool_id {
            match self.sim.tool_library.get(id) {
                Some(mesh) => {
                    let mut tool = mesh.clone();
                    tool.translate(&self.pose.position().coords);
                    self.tool = Arc::new(tool);
                    debug!(tool = %id, line = command.line_number, "tool changed");
                }
                None => debug!(tool = %id, "no mesh registered for tool, keeping current"),
            }
        }
        self.active_tool = command.tool_id.clone();
    }

    fn move_tool(&mut self, step: &Vector3<f64>, spindle_rpm: f64, dt: f64) {
        let mut tool = TriMesh::clone(&self.tool);
        tool.translate(step);
        if self.sim.config.mode == SimulationMode::Accurate && spindle_rpm != 0.0 {
            let spin = spindle_rpm / 60.0 * 360.0 * dt;
            let axis = tool.centroid();
            tool.transform(&Transform::c_axis(spin, &axis));
        }
        self.tool = Arc::new(tool);
    }

    fn remove_material(&mut self, command: &MotionCommand, motion: &SubstepMotion) -> ToolpathFrame {
        let line = command.line_number;
        let removed = match csg::intersection(&self.workpiece, &self.tool) {
            Ok(removed) => removed,
            Err(err) => {
                warn!(line, %err, "intersection failed, metrics unavailable");
                return ToolpathFrame::unavailable(self.pose, line, self.elapsed);
            }
        };
        if removed.is_empty() {
            return ToolpathFrame::air(self.pose, line, self.elapsed);
        }

        let config = &self.sim.config;
        let simplified;
        let base: &TriMesh = if self.workpiece.face_count() > config.facet_threshold {
            simplified = simplify(&self.workpiece, config.facet_threshold, config.decimation_ratio);
            &simplified
        } else {
            &self.workpiece
        };
        match csg::difference(base, &self.tool) {
            Ok(cut) => self.workpiece = Arc::new(cut),
            Err(err) => {
                warn!(line, %err, "difference failed, workpiece unchanged");
                return ToolpathFrame::unavailable(self.pose, line, self.elapsed);
            }
        }

        let metrics = cut_metrics(&removed, motion, config.mode);
        let cutting_force =
            self.plant
                .step(metrics.width, metrics.depth, command.spindle_speed, command.feed);
        ToolpathFrame {
            pose: self.pose,
            width: metrics.width,
            depth: metrics.depth,
            cross_section_area: metrics.cross_section_area,
            source_line: line,
            elapsed_time: self.elapsed,
            cutting_force,
            status: CutStatus::Cut,
        }
    }

    fn record(&mut self, frame: ToolpathFrame) {
        match frame.status {
            CutStatus::Cut => self.report.cut_frames += 1,
            CutStatus::Air => self.report.air_frames += 1,
            CutStatus::Unavailable => self.report.unavailable_frames += 1,
        }
        self.report.substeps += 1;
        self.frames.push(frame);
        if self.sim.config.record_snapshots {
            self.snapshots.push(MeshSnapshot {
                workpiece: Arc::clone(&self.workpiece),
                tool: Arc::clone(&self.tool),
            });
        }
    }

    fn finish(self) -> SimulationOutput {
        SimulationOutput {
            frames: self.frames,
            snapshots: self.snapshots,
            workpiece: self.workpiece,
            tool: self.tool,
            report: self.report,
        }
    }
}

/// A run executing on a background thread.
#[derive(Debug)]
pub struct SimulationHandle {
    handle: JoinHandle<SimulationOutput>,
    progress: ProgressCounter,
    cancel: CancelToken,
}

impl SimulationHandle {
    /// Latest progress in `[0, 1000]`.
    pub fn progress(&self) -> f64 {
        self.progress.get()
    }

    /// Ask the run to stop before its next command.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// True once the worker has returned.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end.
    pub fn join(self) -> Result<SimulationOutput> {
        self.handle
            .join()
            .map_err(|_| SimError::Worker("simulation thread panicked".into()))
    }
}

/// Run `commands` on a new thread, publishing progress to a shared counter.
pub fn spawn_simulation(
    simulation: Simulation,
    commands: Vec<MotionCommand>,
) -> Result<SimulationHandle> {
    let progress = ProgressCounter::new();
    let cancel = CancelToken::new();
    let mut sink = progress.clone();
    let token = cancel.clone();
    let handle = thread::Builder::new()
        .name("cutsim-run".into())
        .spawn(move || simulation.run(&commands, &mut sink, Some(&token)))
        .map_err(|e| SimError::Worker(e.to_string()))?;
    Ok(SimulationHandle {
        handle,
        progress,
        cancel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoProgress;
    use approx::assert_relative_eq;
    use vcad_cutsim_gcode::ArcParams;

    fn command(mode: MotionMode, line: usize, target: Pose, feed: f64) -> MotionCommand {
        MotionCommand {
            mode,
            line_number: line,
            target,
            feed,
            spindle_speed: 1000.0,
            arc: None,
            tool_id: None,
        }
    }

    fn at(x: f64, y: f64, z: f64) -> Pose {
        Pose::new(x, y, z, 0.0, 0.0)
    }

    fn far_apart_with(config: SimulationConfig) -> Simulation {
        let workpiece =
            TriMesh::cuboid(&Point3::new(100.0, 100.0, 0.0), &Point3::new(110.0, 110.0, 5.0)).unwrap();
        let tool = TriMesh::cuboid(&Point3::new(-0.5, -0.5, 0.0), &Point3::new(0.5, 0.5, 5.0)).unwrap();
        Simulation::new(workpiece, tool, config).unwrap()
    }

    fn unit_step() -> SimulationConfig {
        SimulationConfig {
            simulation_step: 1.0,
            ..Default::default()
        }
    }

    fn far_apart() -> Simulation {
        far_apart_with(unit_step())
    }

    #[test]
    fn test_substep_counts() {
        let sim = far_apart();
        let commands = [
            command(MotionMode::Rapid, 1, at(0.0, 0.0, 10.0), 0.0),
            command(MotionMode::Linear, 2, at(10.0, 0.0, 10.0), 300.0),
            command(MotionMode::Linear, 3, at(10.0, 0.0, 10.0), 300.0),
            command(MotionMode::Linear, 4, at(10.0, 0.25, 10.0), 300.0),
        ];
        let out = sim.run(&commands, &mut NoProgress, None);
        // 5 rapid + 10 + none for a zero move + at least one
        assert_eq!(out.frames.len(), 5 + 10 + 0 + 1);
        assert_eq!(out.report.substeps, out.frames.len());
        assert_eq!(out.report.air_frames, out.frames.len());
        assert_eq!(out.snapshots.len(), out.frames.len());
    }

    #[test]
    fn test_timing() {
        let sim = far_apart();
        let commands = [
            command(MotionMode::Rapid, 1, at(0.0, 0.0, 10.0), 0.0),
            command(MotionMode::Linear, 2, at(10.0, 0.0, 10.0), 300.0),
        ];
        let out = sim.run(&commands, &mut NoProgress, None);
        // 10 mm at 3000 mm/min, then 10 mm at 300 mm/min
        assert_relative_eq!(out.frames[4].elapsed_time, 0.2, epsilon = 1e-12);
        assert_relative_eq!(out.frames.last().unwrap().elapsed_time, 2.2, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_feed_uses_rapid_rate() {
        let sim = far_apart();
        let commands = [command(MotionMode::Linear, 1, at(5.0, 0.0, 0.0), 0.0)];
        let out = sim.run(&commands, &mut NoProgress, None);
        assert_eq!(out.frames.len(), 5);
        assert_relative_eq!(out.frames[4].elapsed_time, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_arc_follows_circle() {
        let sim = far_apart();
        let mut arc = command(MotionMode::ArcCcw, 2, at(-20.0, 0.0, 0.0), 600.0);
        arc.arc = Some(ArcParams::center_offset(-10.0, 0.0));
        // The run starts at the origin, so the rapid has no motion.
        let commands = [command(MotionMode::Rapid, 1, at(0.0, 0.0, 0.0), 0.0), arc];
        let out = sim.run(&commands, &mut NoProgress, None);

        let half_circle = std::f64::consts::PI * 10.0;
        assert_eq!(out.frames.len(), half_circle.ceil() as usize);
        for frame in &out.frames {
            let r = (frame.pose.position() - Point3::new(-10.0, 0.0, 0.0)).norm();
            assert_relative_eq!(r, 10.0, epsilon = 1e-9);
            assert!(frame.pose.y >= -1e-9);
        }
        assert_eq!(out.frames.last().unwrap().pose, at(-20.0, 0.0, 0.0));
    }

    #[test]
    fn test_rotary_only_move() {
        let mut config = unit_step();
        config.rotary.c_center = Some([0.0, 0.0, 0.0]);
        let sim = far_apart_with(config);
        let commands = [command(MotionMode::Linear, 1, Pose::new(0.0, 0.0, 0.0, 90.0, 0.0), 300.0)];
        let out = sim.run(&commands, &mut NoProgress, None);
        assert!(out.frames.len() > 1);
        assert_eq!(out.frames.last().unwrap().pose.c, 90.0);
        // The workpiece turned, so its box moved.
        let before = sim.workpiece().bounds().unwrap();
        let after = out.workpiece.bounds().unwrap();
        assert!((before.center() - after.center()).norm() > 1e-6);
    }

    #[test]
    fn test_invalid_command_is_reported() {
        let sim = far_apart();
        let commands = [
            command(MotionMode::Linear, 1, at(f64::NAN, 0.0, 0.0), 300.0),
            command(MotionMode::Linear, 2, at(2.0, 0.0, 0.0), 300.0),
        ];
        let mut seen = Vec::new();
        let out = sim.run(&commands, &mut |p: f64| seen.push(p), None);
        assert_eq!(out.report.failures.len(), 1);
        assert_eq!(out.report.failures[0].line, 1);
        assert_eq!(out.frames.len(), 2);
        assert_eq!(out.report.commands, 2);
        assert_eq!(seen.last(), Some(&1000.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_substep_limit() {
        let sim = far_apart_with(SimulationConfig {
            max_substeps: 10,
            ..unit_step()
        });
        let commands = [command(MotionMode::Linear, 7, at(50.0, 0.0, 0.0), 300.0)];
        let out = sim.run(&commands, &mut NoProgress, None);
        assert!(out.frames.is_empty());
        assert!(out.report.failures[0].message.contains("line 7"));
    }

    #[test]
    fn test_snapshots_can_be_disabled() {
        let sim = far_apart_with(SimulationConfig {
            record_snapshots: false,
            ..unit_step()
        });
        let out = sim.run(&[command(MotionMode::Rapid, 1, at(1.0, 0.0, 0.0), 0.0)], &mut NoProgress, None);
        assert_eq!(out.frames.len(), 5);
        assert!(out.snapshots.is_empty());
    }

    #[test]
    fn test_tool_library_swap() {
        let big = TriMesh::cuboid(&Point3::origin(), &Point3::new(4.0, 4.0, 4.0)).unwrap();
        let sim = far_apart().with_tool("T2", &big).unwrap();
        let mut first = command(MotionMode::Rapid, 1, at(1.0, 0.0, 0.0), 0.0);
        first.tool_id = Some("T2".into());
        let mut second = command(MotionMode::Rapid, 2, at(2.0, 0.0, 0.0), 0.0);
        second.tool_id = Some("T9".into());

        let out = sim.run(&[first, second], &mut NoProgress, None);
        let size = out.tool.bounds().unwrap().size();
        assert_relative_eq!(size.x, 4.0, epsilon = 1e-9);
        // placed at the pose of the change, then moved with the second rapid
        assert_relative_eq!(out.tool.bounds().unwrap().min.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_failed_boolean_marks_substep_unavailable() {
        let block =
            TriMesh::cuboid(&Point3::new(0.0, -5.0, -5.0), &Point3::new(10.0, 5.0, 0.0)).unwrap();
        let solid = TriMesh::cuboid(&Point3::origin(), &Point3::new(1.0, 1.0, 5.0)).unwrap();
        // One face missing, so the Boolean kernel rejects it.
        let open = TriMesh::new(solid.vertices().to_vec(), solid.triangles()[1..].to_vec()).unwrap();
        assert!(!open.is_closed());
        let sim = Simulation::new(block, solid.clone(), unit_step())
            .unwrap()
            .with_tool("T1", &solid)
            .unwrap()
            .with_tool("T2", &open)
            .unwrap();

        // Plunge 0.5 mm into the block with the open tool, then cut 3 mm
        // with the closed one.
        let mut plunge = command(MotionMode::Linear, 1, at(0.5, 0.0, -0.5), 300.0);
        plunge.tool_id = Some("T2".into());
        let mut cut = command(MotionMode::Linear, 2, at(3.5, 0.0, -0.5), 300.0);
        cut.tool_id = Some("T1".into());

        let out = sim.run(&[plunge, cut], &mut NoProgress, None);
        assert!(out.report.failures.is_empty());
        assert_eq!(out.frames.len(), 1 + 3);

        let failed = &out.frames[0];
        assert_eq!(failed.status, CutStatus::Unavailable);
        assert_eq!(failed.source_line, 1);
        assert!(failed.width.is_nan() && failed.cutting_force.is_nan());
        assert_eq!(out.report.unavailable_frames, 1);
        assert!(Arc::ptr_eq(&out.snapshots[0].workpiece, &sim.workpiece));

        assert!(out.frames[1..].iter().all(|f| f.status == CutStatus::Cut));
        assert_eq!(out.report.cut_frames, 3);
        assert!(out.workpiece.volume() < sim.workpiece().volume());
        assert!(!out.report.is_clean());
    }

    #[test]
    fn test_background_run() {
        let sim = far_apart();
        let commands = vec![
            command(MotionMode::Rapid, 1, at(0.0, 0.0, 10.0), 0.0),
            command(MotionMode::Linear, 2, at(10.0, 0.0, 10.0), 300.0),
        ];
        let handle = spawn_simulation(sim, commands).unwrap();
        let out = handle.join().unwrap();
        assert_eq!(out.frames.len(), 15);
    }

    #[test]
    fn test_cancel_before_start() {
        let sim = far_apart();
        let token = CancelToken::new();
        token.cancel();
        let commands = [command(MotionMode::Rapid, 1, at(0.0, 0.0, 10.0), 0.0)];
        let out = sim.run(&commands, &mut NoProgress, Some(&token));
        assert!(out.report.cancelled);
        assert!(out.frames.is_empty());
        assert_eq!(out.report.commands, 0);
    }
}
