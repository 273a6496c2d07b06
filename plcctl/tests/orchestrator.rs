use plcctl::{
    Action, ActionExecutor, CodeGenerator, Completion, CompletionRequest, Config, DisplayId,
    Error, Instruction, LlmCodeGenerator, LlmPlanner, Orchestrator, RunConfig, RunState, Step,
    StepList, StepPlanner,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

type Calls = Rc<RefCell<Vec<(String, Action, Option<String>)>>>;

fn run_config(root: &Path, display: DisplayId) -> RunConfig {
    let mut run = RunConfig::resolve(&Config::default(), root, display);
    run.step_delay = Duration::ZERO;
    run.retry.delay = Duration::ZERO;
    run
}

fn write_order(run: &RunConfig, text: &str) {
    Instruction::store(&run.instruction_path, text).unwrap();
}

/// Writes a fixed plan to disk, optionally without the envelope
struct FixedPlanner {
    steps: StepList,
    path: PathBuf,
    bare: bool,
    seen: Rc<RefCell<Vec<(String, DisplayId)>>>,
}

impl FixedPlanner {
    fn new(run: &RunConfig, steps: Vec<Step>) -> Self {
        Self {
            steps: StepList::new(steps),
            path: run.steps_path.clone(),
            bare: false,
            seen: Rc::default(),
        }
    }
}

impl StepPlanner for FixedPlanner {
    fn plan(&self, instruction: &Instruction, display: DisplayId) -> plcctl::Result<StepList> {
        self.seen
            .borrow_mut()
            .push((instruction.as_str().to_string(), display));
        if self.bare {
            fs::create_dir_all(self.path.parent().unwrap())?;
            fs::write(&self.path, serde_json::to_string(self.steps.steps())?)?;
        } else {
            self.steps.save(&self.path)?;
        }
        Ok(self.steps.clone())
    }
}

struct FailingPlanner;

impl StepPlanner for FailingPlanner {
    fn plan(&self, _: &Instruction, _: DisplayId) -> plcctl::Result<StepList> {
        Err(Error::PlanningUnavailable("connection refused".into()))
    }
}

/// Returns `code`, after failing `failures` times
struct StubGenerator {
    code: String,
    failures: RefCell<u32>,
    seen: Rc<RefCell<Vec<String>>>,
}

impl StubGenerator {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            failures: RefCell::new(0),
            seen: Rc::default(),
        }
    }
}

impl CodeGenerator for StubGenerator {
    fn generate(&self, instruction: &Instruction) -> plcctl::Result<String> {
        self.seen.borrow_mut().push(instruction.as_str().to_string());
        let mut failures = self.failures.borrow_mut();
        if *failures > 0 {
            *failures -= 1;
            return Err(Error::GenerationUnavailable("timeout".into()));
        }
        Ok(self.code.clone())
    }
}

/// Records every call; templates listed in `missing` are not found that many times
#[derive(Default)]
struct RecordingExecutor {
    calls: Calls,
    missing: HashMap<String, u32>,
}

impl RecordingExecutor {
    fn missing(template: &str, times: u32) -> Self {
        Self {
            missing: HashMap::from([(template.to_string(), times)]),
            ..Self::default()
        }
    }
}

impl ActionExecutor for RecordingExecutor {
    fn execute(&mut self, template: &str, action: Action, text: Option<&str>) -> plcctl::Result<()> {
        self.calls
            .borrow_mut()
            .push((template.to_string(), action, text.map(str::to_string)));
        if let Some(left) = self.missing.get_mut(template) {
            if *left > 0 {
                *left -= 1;
                return Err(Error::ElementNotFound {
                    template: template.to_string(),
                    threshold: 0.8,
                });
            }
        }
        Ok(())
    }
}

fn templates(calls: &Calls) -> Vec<String> {
    calls.borrow().iter().map(|(t, _, _)| t.clone()).collect()
}

#[test]
fn every_step_runs_once_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));
    write_order(&run, "open TIA Portal");

    let planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::Click),
            Step::new("i2.png", Action::Click),
            Step::new("i3.png", Action::Click),
        ],
    );
    let seen = planner.seen.clone();
    let generator = StubGenerator::new("unused");
    let generated = generator.seen.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    let mut orchestrator = Orchestrator::new(planner, generator, executor, run);
    let report = orchestrator.run().unwrap();

    assert_eq!(orchestrator.state(), RunState::Done);
    assert_eq!(report.attempts, vec![1, 1, 1]);
    assert_eq!(templates(&calls), vec!["i1.png", "i2.png", "i3.png"]);
    assert!(calls.borrow().iter().all(|(_, a, text)| *a == Action::Click && text.is_none()));
    assert_eq!(*seen.borrow(), vec![("open TIA Portal".to_string(), DisplayId(1))]);
    assert!(generated.borrow().is_empty());
}

#[test]
fn paste_step_gets_code_for_the_stored_order() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(2));
    write_order(&run, "start the conveyor motor");

    let planner = FixedPlanner::new(&run, vec![Step::new("i4.png", Action::PasteText)]);
    let generator = StubGenerator::new("IF \"Start\" THEN \"Q_Motor\" := TRUE; END_IF;");
    let generated = generator.seen.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    Orchestrator::new(planner, generator, executor, run).run().unwrap();

    assert_eq!(*generated.borrow(), vec!["start the conveyor motor"]);
    assert_eq!(
        *calls.borrow(),
        vec![(
            "i4.png".to_string(),
            Action::PasteText,
            Some("IF \"Start\" THEN \"Q_Motor\" := TRUE; END_IF;".to_string())
        )]
    );
}

#[test]
fn element_not_found_retries_the_same_step() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));
    write_order(&run, "open the project");

    let planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::Click),
            Step::new("i2.png", Action::Click),
        ],
    );
    let executor = RecordingExecutor::missing("i1.png", 1);
    let calls = executor.calls.clone();

    let report = Orchestrator::new(planner, StubGenerator::new("x"), executor, run)
        .run()
        .unwrap();

    assert_eq!(templates(&calls), vec!["i1.png", "i1.png", "i2.png"]);
    assert_eq!(report.attempts, vec![2, 1]);
    assert_eq!(report.retries(), 1);
}

#[test]
fn bare_step_array_replays_the_same_steps() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));
    write_order(&run, "open TIA Portal");

    let mut planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::Click),
            Step::new("i2.png", Action::Click),
        ],
    );
    planner.bare = true;
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    Orchestrator::new(planner, StubGenerator::new("x"), executor, run)
        .run()
        .unwrap();

    assert_eq!(templates(&calls), vec!["i1.png", "i2.png"]);
}

#[test]
fn bounded_retries_give_up() {
    let dir = tempfile::tempdir().unwrap();
    let mut run = run_config(dir.path(), DisplayId(1));
    run.retry.max_retries = Some(2);
    write_order(&run, "open TIA Portal");

    let planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::Click),
            Step::new("i2.png", Action::Click),
        ],
    );
    let executor = RecordingExecutor::missing("i2.png", u32::MAX);
    let calls = executor.calls.clone();

    let mut orchestrator = Orchestrator::new(planner, StubGenerator::new("x"), executor, run);
    match orchestrator.run() {
        Err(Error::RetriesExhausted { step, attempts }) => {
            assert_eq!(step, 2);
            assert_eq!(attempts, 3);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(orchestrator.state(), RunState::Aborted);
    assert_eq!(templates(&calls), vec!["i1.png", "i2.png", "i2.png", "i2.png"]);
}

#[test]
fn missing_order_aborts_before_planning() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));

    let planner = FixedPlanner::new(&run, vec![Step::new("i1.png", Action::Click)]);
    let seen = planner.seen.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    let mut orchestrator = Orchestrator::new(planner, StubGenerator::new("x"), executor, run);
    assert!(matches!(orchestrator.run(), Err(Error::InputMissing { .. })));
    assert_eq!(orchestrator.state(), RunState::Aborted);
    assert!(seen.borrow().is_empty());
    assert!(calls.borrow().is_empty());
}

#[test]
fn planner_failure_aborts_without_executing() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));
    write_order(&run, "open TIA Portal");

    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    let mut orchestrator = Orchestrator::new(FailingPlanner, StubGenerator::new("x"), executor, run);
    let err = orchestrator.run().unwrap_err();
    assert!(err.is_fatal());
    assert!(matches!(err, Error::PlanningUnavailable(_)));
    assert!(calls.borrow().is_empty());
}

#[test]
fn generated_code_is_reused_across_paste_steps() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(2));
    write_order(&run, "stop the motor");

    let planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::PasteText),
            Step::new("i2.png", Action::PasteText),
        ],
    );
    let generator = StubGenerator::new("\"Q_Motor\" := FALSE;");
    let generated = generator.seen.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    Orchestrator::new(planner, generator, executor, run).run().unwrap();

    assert_eq!(generated.borrow().len(), 1);
    assert!(calls
        .borrow()
        .iter()
        .all(|(_, _, text)| text.as_deref() == Some("\"Q_Motor\" := FALSE;")));
}

#[test]
fn uncached_generation_runs_per_paste_step() {
    let dir = tempfile::tempdir().unwrap();
    let mut run = run_config(dir.path(), DisplayId(2));
    run.cache_generated_code = false;
    write_order(&run, "stop the motor");

    let planner = FixedPlanner::new(
        &run,
        vec![
            Step::new("i1.png", Action::PasteText),
            Step::new("i2.png", Action::PasteText),
        ],
    );
    let generator = StubGenerator::new("\"Q_Motor\" := FALSE;");
    let generated = generator.seen.clone();

    Orchestrator::new(planner, generator, RecordingExecutor::default(), run)
        .run()
        .unwrap();

    assert_eq!(generated.borrow().len(), 2);
}

#[test]
fn failed_generation_is_retried_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(2));
    write_order(&run, "stop the motor");

    let planner = FixedPlanner::new(&run, vec![Step::new("i1.png", Action::PasteText)]);
    let generator = StubGenerator::new("\"Q_Motor\" := FALSE;");
    *generator.failures.borrow_mut() = 2;
    let generated = generator.seen.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    let report = Orchestrator::new(planner, generator, executor, run)
        .run()
        .unwrap();

    assert_eq!(generated.borrow().len(), 3);
    assert_eq!(report.attempts, vec![3]);
    // The executor only sees the attempt that had code
    assert_eq!(calls.borrow().len(), 1);
}

/// Answers planner prompts with a plan and generator prompts with code
struct ScriptedLlm {
    plan: &'static str,
    code: &'static str,
    prompts: RefCell<Vec<String>>,
}

impl Completion for ScriptedLlm {
    fn complete(&self, request: &CompletionRequest) -> plcctl::Result<String> {
        self.prompts.borrow_mut().push(request.prompt.clone());
        if request.prompt.contains("MarchaParo_1") {
            Ok(self.code.to_string())
        } else {
            Ok(self.plan.to_string())
        }
    }
}

#[test]
fn motor_order_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(2));
    write_order(&run, "turn on the motor");

    let llm = ScriptedLlm {
        plan: "```json\n[{\"step\": \"i1.png\", \"action\": \"clic\"}, {\"step\": \"i2.png\", \"action\": \"texto\"}]\n```",
        code: "Q_Motor := TRUE;",
        prompts: RefCell::new(Vec::new()),
    };
    let planner = LlmPlanner::new(&llm, &run.steps_path);
    let generator = LlmCodeGenerator::new(&llm);
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();
    let steps_path = run.steps_path.clone();

    Orchestrator::new(planner, generator, executor, run).run().unwrap();

    assert_eq!(
        *calls.borrow(),
        vec![
            ("i1.png".to_string(), Action::Click, None),
            (
                "i2.png".to_string(),
                Action::PasteText,
                Some("Q_Motor := TRUE;".to_string())
            ),
        ]
    );

    let prompts = llm.prompts.borrow();
    assert_eq!(prompts.len(), 2);
    assert!(prompts[0].contains("turn on the motor"));
    assert!(prompts[0].contains("Selected monitor: 2"));
    assert!(prompts[1].contains("turn on the motor"));

    let persisted: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(steps_path).unwrap()).unwrap();
    assert_eq!(
        persisted,
        serde_json::json!({"text": [
            {"step": "i1.png", "action": "clic"},
            {"step": "i2.png", "action": "texto"}
        ]})
    );
}

#[test]
fn malformed_plan_aborts_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let run = run_config(dir.path(), DisplayId(1));
    write_order(&run, "turn on the motor");

    let llm = ScriptedLlm {
        plan: "[{\"step\": \"i1.png\", \"action\": \"doubleclick\"}]",
        code: "",
        prompts: RefCell::new(Vec::new()),
    };
    let steps_path = run.steps_path.clone();
    let executor = RecordingExecutor::default();
    let calls = executor.calls.clone();

    let mut orchestrator = Orchestrator::new(
        LlmPlanner::new(&llm, &run.steps_path),
        LlmCodeGenerator::new(&llm),
        executor,
        run,
    );
    match orchestrator.run() {
        Err(Error::PlanningMalformed { raw, .. }) => assert!(raw.contains("doubleclick")),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!steps_path.exists());
    assert!(calls.borrow().is_empty());
}
