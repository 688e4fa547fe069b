//! Line-by-line G-code interpretation.
//!
//! The interpreter keeps modal state (distance mode, motion mode, feed,
//! spindle speed, variables, active tool) across lines and emits a
//! [`MotionCommand`] for every line that moves an axis or carries arc words.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::command::{ArcParams, Axis, MotionCommand, MotionMode, Pose};
use crate::dialect::Dialect;
use crate::expr::{Evaluator, Variables};

/// Lines processed between progress reports.
const PROGRESS_INTERVAL: usize = 1000;

static LINE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^N\d+\s*").expect("valid line number pattern"));
static TOOL_CHANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bT(\d+)\b").expect("valid tool pattern"));
static TOOL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\btoolname\s*=").expect("valid tool name pattern"));
static MOTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bG0*([0-3])\b").expect("valid motion pattern"));
static ARC_WORDS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    ['R', 'I', 'J', 'K'].map(|letter| {
        Regex::new(&format!(r"\b{letter}\s*([-+]?(?:\d+\.?\d*|\.\d+))"))
            .expect("valid arc word pattern")
    })
});

/// A tool seen in the program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Tool id, `T<n>` without leading zeros.
    pub id: String,
    /// The nearby `toolname=` comment, if one was found.
    pub comment: Option<String>,
}

/// Result of interpreting a program.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    /// Motion commands in source order.
    pub commands: Vec<MotionCommand>,
    /// Tools in order of first appearance.
    pub tools: Vec<ToolRecord>,
    /// Variable table at the end of the program.
    pub variables: Variables,
}

/// Modal state carried from line to line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserState {
    /// G90 (true) or G91 (false).
    pub is_absolute: bool,
    /// Current commanded pose.
    pub pose: Pose,
    /// Cached motion mode.
    pub mode: MotionMode,
    /// Current feed in mm/min.
    pub feed: f64,
    /// Current spindle speed in rpm.
    pub spindle_speed: f64,
    /// Variable table.
    pub variables: Variables,
    /// Active tool id.
    pub current_tool: Option<String>,
    /// Tool registry.
    pub tools: Vec<ToolRecord>,
}

impl ParserState {
    /// Power-on state with the given variable table.
    pub fn new(variables: Variables) -> Self {
        Self {
            is_absolute: true,
            pose: Pose::default(),
            mode: MotionMode::Rapid,
            feed: 0.0,
            spindle_speed: 0.0,
            variables,
            current_tool: None,
            tools: Vec::new(),
        }
    }

    fn select_tool(&mut self, id: String, comment: Option<String>) {
        tracing::debug!("tool change to {id} ({})", comment.as_deref().unwrap_or("no comment"));
        if !self.tools.iter().any(|tool| tool.id == id) {
            self.tools.push(ToolRecord {
                id: id.clone(),
                comment,
            });
        }
        self.current_tool = Some(id);
    }
}

impl Default for ParserState {
    fn default() -> Self {
        Self::new(Variables::new())
    }
}

/// G-code interpreter for one dialect.
#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    dialect: Dialect,
    variables: Variables,
}

impl Interpreter {
    /// Create an interpreter with an empty variable table.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            variables: Variables::new(),
        }
    }

    /// Preset variables before the program runs.
    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    /// The dialect this interpreter reads.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Interpret a whole program given as text.
    pub fn parse_str(&self, text: &str) -> Program {
        let lines: Vec<&str> = text.lines().collect();
        self.parse(&lines)
    }

    /// Interpret a program given as lines.
    pub fn parse<S: AsRef<str>>(&self, lines: &[S]) -> Program {
        self.parse_with_progress(lines, &mut |_| {})
    }

    /// Interpret a program, reporting permille progress.
    ///
    /// `progress` is called every 1000 lines with a non-decreasing value in
    /// `[0, 1000]` and once with `1000.0` at the end.
    pub fn parse_with_progress<S: AsRef<str>>(
        &self,
        lines: &[S],
        progress: &mut dyn FnMut(f64),
    ) -> Program {
        let mut state = ParserState::new(self.variables.clone());
        let mut commands = Vec::new();
        let total = lines.len().max(1) as f64;

        for index in 0..lines.len() {
            if index % PROGRESS_INTERVAL == 0 {
                progress(((index + 1) as f64 * 1000.0 / total).min(1000.0));
            }
            if let Some(command) = self.interpret_line(&mut state, lines, index) {
                commands.push(command);
            }
        }
        progress(1000.0);

        tracing::debug!(
            "interpreted {} lines into {} commands, {} tools",
            lines.len(),
            commands.len(),
            state.tools.len()
        );

        Program {
            commands,
            tools: state.tools,
            variables: state.variables,
        }
    }

    fn interpret_line<S: AsRef<str>>(
        &self,
        state: &mut ParserState,
        lines: &[S],
        index: usize,
    ) -> Option<MotionCommand> {
        let raw = lines[index].as_ref();
        let clean = self.dialect.strip_comment(raw);
        if clean.is_empty() {
            return None;
        }
        let code = LINE_NUMBER.replace(&clean, "");
        let code = code.trim();
        if code.is_empty() {
            return None;
        }

        let grammar = self.dialect.grammar();

        for caps in grammar.assignment.captures_iter(&clean) {
            let Ok(number) = caps[1].parse::<u32>() else {
                continue;
            };
            let value = Evaluator::new(self.dialect, &state.variables).evaluate(&caps[2]);
            state.variables.insert(number, value);
        }

        if let Some(caps) = TOOL_CHANGE.captures(code) {
            let id = match caps[1].parse::<u64>() {
                Ok(n) => format!("T{n}"),
                Err(_) => format!("T{}", &caps[1]),
            };
            let comment = self.tool_comment(lines, index);
            state.select_tool(id, comment);
        }

        if code.contains("G90") {
            state.is_absolute = true;
        } else if code.contains("G91") {
            state.is_absolute = false;
        }

        if let Some(mode) = MOTION
            .captures(code)
            .and_then(|caps| caps[1].parse::<u8>().ok())
            .and_then(MotionMode::from_g_number)
        {
            state.mode = mode;
        }

        let evaluator = Evaluator::new(self.dialect, &state.variables);
        if let Some(caps) = grammar.feed.captures(code) {
            state.feed = evaluator.evaluate(&caps[1]);
        }
        if let Some(caps) = grammar.spindle.captures(code) {
            state.spindle_speed = evaluator.evaluate(&caps[1]);
        }

        let mut target = state.pose;
        for (axis, pattern) in Axis::ALL.iter().zip(&grammar.axes) {
            if let Some(caps) = pattern.captures(code) {
                let value = evaluator.evaluate(&caps[1]);
                let current = state.pose.get(*axis);
                target.set(*axis, if state.is_absolute { value } else { current + value });
            }
        }

        let arc = if state.mode.is_arc() {
            Some(self.arc_words(code, &evaluator)).filter(|params| !params.is_empty())
        } else {
            None
        };

        if target == state.pose && arc.is_none() {
            return None;
        }
        state.pose = target;

        Some(MotionCommand {
            mode: state.mode,
            line_number: index + 1,
            target,
            feed: state.feed,
            spindle_speed: state.spindle_speed,
            arc,
            tool_id: state.current_tool.clone(),
        })
    }

    /// R/I/J/K words of a circular-mode line.
    ///
    /// Variable assignments are removed first so `R1=5` is not read as a
    /// radius.
    fn arc_words(&self, code: &str, evaluator: &Evaluator<'_>) -> ArcParams {
        let code = self.dialect.grammar().assignment.replace_all(code, "");
        let [r, i, j, k] = ARC_WORDS
            .each_ref()
            .map(|pattern| pattern.captures(&code).map(|caps| evaluator.evaluate(&caps[1])));
        ArcParams { r, i, j, k }
    }

    /// `toolname=` comment on the current, next or previous raw line.
    fn tool_comment<S: AsRef<str>>(&self, lines: &[S], index: usize) -> Option<String> {
        let window = [Some(index), index.checked_add(1), index.checked_sub(1)];
        window
            .into_iter()
            .flatten()
            .filter_map(|i| lines.get(i))
            .filter_map(|line| self.dialect.comment(line.as_ref()))
            .find(|comment| TOOL_NAME.is_match(comment))
            .map(str::to_string)
    }
}
