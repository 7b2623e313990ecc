//! Idempotent workflow transforms
//!
//! Every transform follows the same shape: locate its target, return `false`
//! when the target is missing or already in the desired state, otherwise
//! patch the minimum structure and return `true`. Running a transform on its
//! own output never reports a change.

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::document::Document;
use crate::step::{
    append_step, ensure_entry, find_step, has_id, job_steps, name_contains, uses_ends_with,
    uses_starts_with, StepBuilder,
};

pub const FORCE_RUN_INPUT: &str = "force_run";
pub const PRE_INIT_JOB: &str = "pre-init";
pub const PRE_INIT_GATE_ID: &str = "g";
pub const PRE_INIT_GATE_ACTION: &str = "pre-init-gate";
pub const PRE_INIT_GATE_CONDITION: &str = "${{ inputs.force_run != 'true' }}";
pub const DOCS_ONLY_OUTPUT: &str = "${{ steps.out.outputs.docs_only }}";
pub const DOCS_ONLY_STEP_ID: &str = "out";
pub const DOCS_ONLY_STEP_NAME: &str = "Compute docs_only (force_run aware)";

pub const HOSTED_RUNNER: &str = "windows-latest";
pub const CHECKOUT_PREFIX: &str = "actions/checkout@";
pub const CHECKOUT_ACTION: &str = "actions/checkout@v5";
pub const PREFLIGHT_NAME_MATCH: &str = "Verify Windows runner";
pub const PREFLIGHT_STEP_NAME: &str =
    "Verify Windows runner and idle LabVIEW (surface LVCompare notice)";

pub const ALWAYS: &str = "${{ always() }}";
pub const SESSION_INDEX_POST_SUFFIX: &str = "session-index-post";
pub const SESSION_INDEX_POST_ACTION: &str = "./.github/actions/session-index-post";
pub const RUNNER_UNBLOCK_GUARD_SUFFIX: &str = "runner-unblock-guard";
pub const RUNNER_UNBLOCK_GUARD_ACTION: &str = "./.github/actions/runner-unblock-guard";
pub const RUNNER_UNBLOCK_GUARD_NAME: &str = "Runner Unblock Guard";
pub const GUARD_CLEANUP_EXPR: &str = "${{ env.UNBLOCK_GUARD == '1' }}";
pub const GUARD_PROCESS_NAMES: &str = "conhost,pwsh,LabVIEW,LVCompare";

const DOCS_ONLY_RUN: &str = r#"$force = '${{ inputs.force_run }}'
if ($force -ieq 'true') { $val = 'false' } else { $val = '${{ steps.g.outputs.docs_only || ''false'' }}' }
"docs_only=$val" | Out-File -FilePath $env:GITHUB_OUTPUT -Append -Encoding utf8
"#;

const HOSTED_PREFLIGHT_RUN: &str = r#"Write-Host "Runner: $([System.Environment]::OSVersion.VersionString)"
Write-Host "Pwsh:   $($PSVersionTable.PSVersion)"
$cli = 'C:\Program Files\National Instruments\Shared\LabVIEW Compare\LVCompare.exe'
if (-not (Test-Path -LiteralPath $cli)) {
  Write-Host "::notice::LVCompare.exe not found at canonical path: $cli (hosted preflight)"
} else { Write-Host "LVCompare present: $cli" }
$lv = Get-Process -Name 'LabVIEW' -ErrorAction SilentlyContinue
if ($lv) { Write-Host "::error::LabVIEW.exe is running (PID(s): $($lv.Id -join ','))"; exit 1 }
Write-Host 'Preflight OK: Windows runner healthy; LabVIEW not running.'
if ($env:GITHUB_STEP_SUMMARY) {
  $note = @('Note:', '- This preflight runs on hosted Windows (windows-latest); LVCompare presence is not required here.', '- Self-hosted Windows steps later in this workflow enforce LVCompare at the canonical path.') -join "`n"
  $note | Out-File -FilePath $env:GITHUB_STEP_SUMMARY -Append -Encoding utf8
}"#;

// ============================================================================
// DISPATCH INPUT
// ============================================================================

/// Ensure `on.workflow_dispatch.inputs.force_run` exists.
///
/// Without an `on` mapping, or with a missing or null `workflow_dispatch`,
/// the document is left alone. An existing `force_run` input is never
/// rewritten.
pub fn ensure_force_run_input(doc: &mut Document) -> bool {
    let Some(on) = doc.root_mut().get_mut("on").and_then(Value::as_mapping_mut) else {
        return false;
    };
    let Some(dispatch) = on
        .get_mut("workflow_dispatch")
        .and_then(Value::as_mapping_mut)
    else {
        return false;
    };

    let inputs = dispatch
        .entry(Value::from("inputs"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    let Some(inputs) = coerce_mapping(inputs) else {
        return false;
    };
    if inputs.contains_key(FORCE_RUN_INPUT) {
        return false;
    }

    let mut input = Mapping::new();
    input.insert("description".into(), "Force run (bypass docs-only gate)".into());
    input.insert("required".into(), false.into());
    input.insert("default".into(), "false".into());
    input.insert("type".into(), "choice".into());
    input.insert(
        "options".into(),
        Value::Sequence(vec!["true".into(), "false".into()]),
    );
    inputs.insert(FORCE_RUN_INPUT.into(), Value::Mapping(input));
    debug!("added workflow_dispatch input {}", FORCE_RUN_INPUT);
    true
}

/// Treat `null` as an empty mapping; other scalars are left untouched
fn coerce_mapping(value: &mut Value) -> Option<&mut Mapping> {
    if value.is_null() {
        *value = Value::Mapping(Mapping::new());
    }
    value.as_mapping_mut()
}

// ============================================================================
// GATED PRE-INIT
// ============================================================================

/// Route `pre-init`'s `docs_only` output through a force_run-aware step.
///
/// - `outputs.docs_only` points at `steps.out.outputs.docs_only`
/// - the gate step (`id: g`, `uses: …pre-init-gate`) is skipped on force_run
/// - the `out` step is inserted right after the gate when missing
pub fn ensure_preinit_force_run_outputs(doc: &mut Document) -> bool {
    let Some(job) = doc.job_mut(PRE_INIT_JOB) else {
        return false;
    };
    let mut changed = false;

    let outputs = job
        .entry(Value::from("outputs"))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    if !outputs.is_mapping() {
        *outputs = Value::Mapping(Mapping::new());
    }
    if let Some(outputs) = outputs.as_mapping_mut() {
        changed |= ensure_entry(outputs, "docs_only", DOCS_ONLY_OUTPUT.into());
    }

    let Some(Value::Sequence(steps)) = job.get_mut("steps") else {
        return changed;
    };
    let Some(gate) = find_step(steps.as_slice(), |s| {
        has_id(s, PRE_INIT_GATE_ID) && uses_ends_with(s, PRE_INIT_GATE_ACTION)
    }) else {
        return changed;
    };

    if let Some(gate_step) = steps[gate].as_mapping_mut() {
        changed |= ensure_entry(gate_step, "if", PRE_INIT_GATE_CONDITION.into());
    }

    if !steps.iter().any(|s| has_id(s, DOCS_ONLY_STEP_ID)) {
        let out = StepBuilder::new()
            .name(DOCS_ONLY_STEP_NAME)
            .id(DOCS_ONLY_STEP_ID)
            .shell("pwsh")
            .run(DOCS_ONLY_RUN)
            .build();
        steps.insert(gate + 1, out);
        debug!(index = gate + 1, "inserted docs_only step after pre-init gate");
        changed = true;
    }

    changed
}

// ============================================================================
// HOSTED PREFLIGHT
// ============================================================================

fn hosted_preflight_step() -> Value {
    StepBuilder::new()
        .name(PREFLIGHT_STEP_NAME)
        .shell("pwsh")
        .run(HOSTED_PREFLIGHT_RUN)
        .build()
}

/// Pin a job to the hosted Windows runner with a checkout and canonical
/// preflight step.
///
/// An existing step whose name contains "Verify Windows runner" keeps its
/// position; only its `run` body (and `shell`) is replaced when it differs.
/// A new preflight step goes right after the job's checkout, or at index 0
/// when the job had no checkout before this call.
pub fn ensure_hosted_preflight(doc: &mut Document, job_key: &str) -> bool {
    let Some(job) = doc.job_mut(job_key) else {
        return false;
    };
    let mut changed = ensure_entry(job, "runs-on", HOSTED_RUNNER.into());

    let steps = job
        .entry(Value::from("steps"))
        .or_insert_with(|| Value::Sequence(Vec::new()));
    if !steps.is_sequence() {
        *steps = Value::Sequence(Vec::new());
    }
    let Some(steps) = steps.as_sequence_mut() else {
        return changed;
    };

    let insert_at = match find_step(steps.as_slice(), |s| uses_starts_with(s, CHECKOUT_PREFIX)) {
        Some(idx) => idx + 1,
        None => {
            steps.insert(0, StepBuilder::new().uses(CHECKOUT_ACTION).build());
            changed = true;
            0
        }
    };

    match find_step(steps.as_slice(), |s| name_contains(s, PREFLIGHT_NAME_MATCH)) {
        Some(idx) => {
            let body = Value::from(HOSTED_PREFLIGHT_RUN);
            if let Some(step) = steps[idx].as_mapping_mut() {
                if step.get("run") != Some(&body) {
                    step.insert("run".into(), body);
                    step.insert("shell".into(), "pwsh".into());
                    changed = true;
                }
            }
        }
        None => {
            steps.insert(insert_at, hosted_preflight_step());
            debug!(job = job_key, index = insert_at, "inserted hosted preflight step");
            changed = true;
        }
    }

    changed
}

// ============================================================================
// SESSION INDEX POST
// ============================================================================

/// Append the session-index post step with matrix-scoped parameters
pub fn ensure_session_index_post_matrix(doc: &mut Document, job_key: &str) -> bool {
    let step = StepBuilder::new()
        .name("Session index post")
        .condition(ALWAYS)
        .uses(SESSION_INDEX_POST_ACTION)
        .param("results-dir", "tests/results/${{ matrix.category }}")
        .param("validate-schema", true)
        .param("upload", true)
        .param("artifact-name", "session-index-${{ matrix.category }}")
        .build();
    append_unless_present(doc, job_key, SESSION_INDEX_POST_SUFFIX, step)
}

/// Append the best-effort session-index post step with fixed parameters
pub fn ensure_session_index_post(
    doc: &mut Document,
    job_key: &str,
    results_dir: &str,
    artifact_name: &str,
) -> bool {
    let step = StepBuilder::new()
        .name("Session index post (best-effort)")
        .condition(ALWAYS)
        .uses(SESSION_INDEX_POST_ACTION)
        .param("results-dir", results_dir)
        .param("validate-schema", true)
        .param("upload", true)
        .param("artifact-name", artifact_name)
        .build();
    append_unless_present(doc, job_key, SESSION_INDEX_POST_SUFFIX, step)
}

// ============================================================================
// RUNNER UNBLOCK GUARD
// ============================================================================

/// Append the runner-unblock cleanup guard
pub fn ensure_runner_unblock_guard(doc: &mut Document, job_key: &str, snapshot_path: &str) -> bool {
    let step = StepBuilder::new()
        .name(RUNNER_UNBLOCK_GUARD_NAME)
        .condition(ALWAYS)
        .uses(RUNNER_UNBLOCK_GUARD_ACTION)
        .param("snapshot-path", snapshot_path)
        .param("cleanup", GUARD_CLEANUP_EXPR)
        .param("process-names", GUARD_PROCESS_NAMES)
        .build();
    append_unless_present(doc, job_key, RUNNER_UNBLOCK_GUARD_SUFFIX, step)
}

fn append_unless_present(doc: &mut Document, job_key: &str, uses_suffix: &str, step: Value) -> bool {
    let Some(job) = doc.job_mut(job_key) else {
        return false;
    };
    if job_steps(job).iter().any(|s| uses_ends_with(s, uses_suffix)) {
        return false;
    }
    append_step(job, step);
    debug!(job = job_key, action = uses_suffix, "appended step");
    true
}
