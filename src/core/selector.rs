use crate::core::template::stringify;
use crate::domain::model::{CliOverrides, DeploymentDeclaration, ScheduleFields, SelectionRequest};
use crate::domain::ports::{Prompt, SelectOption};
use crate::utils::error::{DeployError, Result};
use serde_json::Value;

pub const IGNORED_OVERRIDES_WARNING: &str = "You have passed options to the deploy command, but you are creating or updating multiple deployments. These options will be ignored.";

/// 一個待處理的部署：已套用 CLI 覆寫的宣告，加上交給排程解析的 CLI 排程欄位
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub declaration: DeploymentDeclaration,
    pub cli_schedule: Option<ScheduleFields>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub candidates: Vec<Candidate>,
    /// 被略過的未命名宣告
    pub skipped: Vec<String>,
    pub not_found: Vec<String>,
    pub warnings: Vec<String>,
}

impl Selection {
    /// 警告只記錄在結果上，由 deploy 指令輸出一次
    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("⚠️ {}", message);
        self.warnings.push(message);
    }
}

/// 依宣告數量與 CLI 選擇條件決定要處理哪些部署
pub struct DeploymentSelector<'a> {
    declarations: &'a [DeploymentDeclaration],
}

impl<'a> DeploymentSelector<'a> {
    pub fn new(declarations: &'a [DeploymentDeclaration]) -> Self {
        Self { declarations }
    }

    pub fn select(&self, request: &SelectionRequest, prompt: &mut dyn Prompt) -> Result<Selection> {
        let mut selection = Selection::default();
        let names = &request.names;

        let chosen = match self.declarations {
            [] => {
                if names.len() > 1 {
                    return Err(DeployError::MultipleNamesError);
                }
                vec![cli_only(names.first())]
            }
            [single] if !request.all || !names.is_empty() => {
                if names.len() > 1 {
                    return Err(DeployError::MultipleNamesError);
                }
                match names.first() {
                    Some(name) if single.name.as_ref() != Some(name) => {
                        selection.warn(format!(
                            "Could not find deployment declaration with name {} in deployment.yaml. Only CLI options will be used for this deployment.",
                            name
                        ));
                        vec![cli_only(Some(name))]
                    }
                    _ => vec![single.clone()],
                }
            }
            declarations if !names.is_empty() => {
                let matched: Vec<DeploymentDeclaration> = declarations
                    .iter()
                    .filter(|d| d.name.as_ref().is_some_and(|n| names.contains(n)))
                    .cloned()
                    .collect();

                selection.not_found = names
                    .iter()
                    .filter(|name| !matched.iter().any(|d| d.name.as_ref() == Some(*name)))
                    .cloned()
                    .collect();

                if !selection.not_found.is_empty() {
                    tracing::debug!("⏭️ Not found: {}", selection.not_found.join(", "));
                }
                matched
            }
            declarations if request.all => self.select_all(declarations, prompt, &mut selection),
            declarations => match self.pick_one(declarations, prompt) {
                Some(declaration) => vec![declaration],
                None if has_target(&request.overrides) => vec![cli_only(None)],
                None => {
                    return Err(DeployError::AmbiguousSelectionError {
                        count: declarations.len(),
                    })
                }
            },
        };

        selection.candidates = self.finish(chosen, &request.overrides, &mut selection);
        Ok(selection)
    }

    fn select_all(
        &self,
        declarations: &[DeploymentDeclaration],
        prompt: &mut dyn Prompt,
        selection: &mut Selection,
    ) -> Vec<DeploymentDeclaration> {
        let mut chosen = Vec::new();

        for (index, declaration) in declarations.iter().enumerate() {
            if declaration.name.is_some() {
                chosen.push(declaration.clone());
                continue;
            }

            if let Some(name) = name_unnamed(prompt) {
                let mut named = declaration.clone();
                named.name = Some(name);
                chosen.push(named);
                continue;
            }

            if prompt.is_interactive() {
                prompt.notify("Skipping unnamed deployment.");
            } else {
                selection.warn("Discovered unnamed deployment. Skipping...");
            }
            selection.skipped.push(describe_unnamed(index, declaration));
        }

        chosen
    }

    fn pick_one(
        &self,
        declarations: &[DeploymentDeclaration],
        prompt: &mut dyn Prompt,
    ) -> Option<DeploymentDeclaration> {
        if !prompt.is_interactive() {
            return None;
        }

        let options: Vec<SelectOption> = declarations
            .iter()
            .map(|d| {
                SelectOption::new(d.display_name())
                    .with_description(d.description.as_ref().map(stringify))
            })
            .collect();

        let index = prompt.select("Which deployment would you like to create or update?", &options)?;
        declarations.get(index).cloned()
    }

    /// 只有單一目標時才套用 CLI 逐欄覆寫
    fn finish(
        &self,
        chosen: Vec<DeploymentDeclaration>,
        overrides: &CliOverrides,
        selection: &mut Selection,
    ) -> Vec<Candidate> {
        if chosen.len() > 1 {
            if !overrides.is_empty() {
                selection.warn(IGNORED_OVERRIDES_WARNING);
            }
            return chosen
                .into_iter()
                .map(|declaration| Candidate {
                    declaration,
                    cli_schedule: None,
                })
                .collect();
        }

        chosen
            .into_iter()
            .map(|mut declaration| {
                apply_overrides(&mut declaration, overrides);
                Candidate {
                    declaration,
                    cli_schedule: (!overrides.schedule.is_empty()).then(|| overrides.schedule.clone()),
                }
            })
            .collect()
    }
}

fn has_target(overrides: &CliOverrides) -> bool {
    overrides.entrypoint.is_some() || overrides.flow_name.is_some()
}

fn cli_only(name: Option<&String>) -> DeploymentDeclaration {
    DeploymentDeclaration {
        name: name.cloned(),
        ..Default::default()
    }
}

fn name_unnamed(prompt: &mut dyn Prompt) -> Option<String> {
    if !prompt.is_interactive() {
        return None;
    }

    prompt.notify("Discovered unnamed deployment.");
    if !prompt.confirm("Would you like to give this deployment a name and deploy it?", false)? {
        return None;
    }

    prompt
        .text("Deployment name")
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}

fn describe_unnamed(index: usize, declaration: &DeploymentDeclaration) -> String {
    match (&declaration.entrypoint, &declaration.flow_name) {
        (Some(entrypoint), _) => format!("#{} ({})", index + 1, entrypoint),
        (None, Some(flow_name)) => format!("#{} (flow {})", index + 1, flow_name),
        (None, None) => format!("#{}", index + 1),
    }
}

/// CLI 欄位覆寫檔案欄位；parameters 與 job_variables 逐鍵合併
pub fn apply_overrides(declaration: &mut DeploymentDeclaration, overrides: &CliOverrides) {
    if let Some(entrypoint) = &overrides.entrypoint {
        declaration.entrypoint = Some(entrypoint.clone());
    }
    if let Some(flow_name) = &overrides.flow_name {
        declaration.flow_name = Some(flow_name.clone());
    }
    if let Some(pool) = &overrides.work_pool {
        declaration.work_pool.name = Some(pool.clone());
    }
    if let Some(queue) = &overrides.work_queue {
        declaration.work_pool.work_queue_name = Some(queue.clone());
    }
    for (key, value) in &overrides.job_variables {
        declaration.work_pool.job_variables.insert(key.clone(), value.clone());
    }
    if let Some(version) = &overrides.version {
        declaration.version = Some(Value::String(version.clone()));
    }
    if !overrides.tags.is_empty() {
        declaration.tags = Some(Value::Array(
            overrides.tags.iter().cloned().map(Value::String).collect(),
        ));
    }
    if let Some(description) = &overrides.description {
        declaration.description = Some(Value::String(description.clone()));
    }
    for (key, value) in &overrides.parameters {
        declaration.parameters.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::prompt::{NonInteractive, ScriptedAnswer, ScriptedPrompt};
    use serde_json::json;

    fn declaration(name: Option<&str>) -> DeploymentDeclaration {
        DeploymentDeclaration {
            name: name.map(str::to_string),
            entrypoint: Some("./flows/hello.py:my_flow".to_string()),
            ..Default::default()
        }
    }

    fn request(names: &[&str], all: bool) -> SelectionRequest {
        SelectionRequest::new(
            names.iter().map(|n| n.to_string()),
            all,
            CliOverrides::default(),
        )
    }

    fn names_of(selection: &Selection) -> Vec<Option<String>> {
        selection
            .candidates
            .iter()
            .map(|c| c.declaration.name.clone())
            .collect()
    }

    #[test]
    fn test_no_declarations_uses_cli_fields() {
        let selector = DeploymentSelector::new(&[]);
        let mut req = request(&["from-cli"], false);
        req.overrides.entrypoint = Some("./flows/hello.py:my_flow".to_string());

        let selection = selector.select(&req, &mut NonInteractive).unwrap();
        assert_eq!(selection.candidates.len(), 1);
        let candidate = &selection.candidates[0].declaration;
        assert_eq!(candidate.name.as_deref(), Some("from-cli"));
        assert_eq!(candidate.entrypoint.as_deref(), Some("./flows/hello.py:my_flow"));

        let result = selector.select(&request(&["a", "b"], false), &mut NonInteractive);
        assert!(matches!(result, Err(DeployError::MultipleNamesError)));
    }

    #[test]
    fn test_single_declaration_with_multiple_names_is_fatal() {
        let declarations = vec![declaration(Some("test-name-1"))];
        let selector = DeploymentSelector::new(&declarations);

        for all in [false, true] {
            let result = selector.select(
                &request(&["test-name-1", "test-name-2"], all),
                &mut NonInteractive,
            );
            assert!(matches!(result, Err(DeployError::MultipleNamesError)));
        }
    }

    #[test]
    fn test_single_declaration_non_matching_name_uses_cli_only() {
        let mut declarations = vec![declaration(Some("test-name-1"))];
        declarations[0].work_pool.name = Some("file-pool".to_string());
        let selector = DeploymentSelector::new(&declarations);

        let selection = selector
            .select(&request(&["other"], false), &mut NonInteractive)
            .unwrap();

        assert_eq!(names_of(&selection), vec![Some("other".to_string())]);
        assert!(selection.candidates[0].declaration.work_pool.name.is_none());
        assert!(selection.candidates[0].declaration.entrypoint.is_none());
        assert!(selection.warnings[0].contains(
            "Could not find deployment declaration with name other in deployment.yaml"
        ));
    }

    #[test]
    fn test_single_declaration_gets_overrides() {
        let mut declarations = vec![declaration(Some("test-name-1"))];
        declarations[0].parameters = json!({"number": 1, "message": "hello"})
            .as_object()
            .cloned()
            .unwrap();
        let selector = DeploymentSelector::new(&declarations);

        let mut req = request(&[], false);
        req.overrides.parameters = json!({"number": 2}).as_object().cloned().unwrap();
        req.overrides.version = Some("1.0.0".to_string());
        req.overrides.tags = vec!["foo-bar".to_string()];
        req.overrides.job_variables = json!({"env": "prod"}).as_object().cloned().unwrap();
        req.overrides.schedule.cron = Some("0 4 * * *".to_string());

        let selection = selector.select(&req, &mut NonInteractive).unwrap();
        let candidate = &selection.candidates[0];
        assert_eq!(
            Value::Object(candidate.declaration.parameters.clone()),
            json!({"number": 2, "message": "hello"})
        );
        assert_eq!(candidate.declaration.version, Some(json!("1.0.0")));
        assert_eq!(candidate.declaration.tags, Some(json!(["foo-bar"])));
        assert_eq!(
            candidate.declaration.work_pool.job_variables.get("env"),
            Some(&json!("prod"))
        );
        assert_eq!(
            candidate.cli_schedule.as_ref().and_then(|s| s.cron.as_deref()),
            Some("0 4 * * *")
        );
        assert!(selection.warnings.is_empty());
    }

    #[test]
    fn test_ambiguous_without_prompt_is_fatal() {
        let declarations = vec![declaration(Some("a")), declaration(Some("b"))];
        let selector = DeploymentSelector::new(&declarations);

        match selector.select(&request(&[], false), &mut NonInteractive) {
            Err(DeployError::AmbiguousSelectionError { count }) => assert_eq!(count, 2),
            other => panic!("expected ambiguity error, got {:?}", other),
        }
    }

    #[test]
    fn test_ambiguous_with_cli_entrypoint_falls_back_to_cli_fields() {
        let declarations = vec![declaration(Some("a")), declaration(Some("b"))];
        let selector = DeploymentSelector::new(&declarations);
        let mut req = request(&[], false);
        req.overrides.entrypoint = Some("./flows/other.py:other_flow".to_string());

        let selection = selector.select(&req, &mut NonInteractive).unwrap();
        assert_eq!(names_of(&selection), vec![None]);
        assert_eq!(
            selection.candidates[0].declaration.entrypoint.as_deref(),
            Some("./flows/other.py:other_flow")
        );
    }

    #[test]
    fn test_interactive_pick_lists_names_and_descriptions() {
        let mut declarations = vec![declaration(Some("test-name-1")), declaration(Some("test-name-2"))];
        declarations[0].description = Some(json!("test-description-1"));
        declarations[1].description = Some(json!("test-description-2"));
        let selector = DeploymentSelector::new(&declarations);

        let mut prompt = ScriptedPrompt::new(vec![ScriptedAnswer::Select(1)]);
        let selection = selector.select(&request(&[], false), &mut prompt).unwrap();

        assert_eq!(names_of(&selection), vec![Some("test-name-2".to_string())]);
        let asked = prompt.transcript().join("\n");
        assert!(asked.contains("Which deployment would you like to create or update?"));
        assert!(asked.contains("test-name-1"));
        assert!(asked.contains("test-description-2"));
    }

    #[test]
    fn test_all_processes_named_and_skips_unnamed() {
        let declarations = vec![
            declaration(Some("test-name-1")),
            declaration(None),
            declaration(Some("test-name-3")),
        ];
        let selector = DeploymentSelector::new(&declarations);

        let selection = selector.select(&request(&[], true), &mut NonInteractive).unwrap();
        assert_eq!(
            names_of(&selection),
            vec![Some("test-name-1".to_string()), Some("test-name-3".to_string())]
        );
        assert_eq!(selection.skipped, vec!["#2 (./flows/hello.py:my_flow)".to_string()]);
        assert!(selection
            .warnings
            .contains(&"Discovered unnamed deployment. Skipping...".to_string()));
    }

    #[test]
    fn test_all_interactive_can_name_unnamed() {
        let declarations = vec![declaration(Some("test-name-1")), declaration(None)];
        let selector = DeploymentSelector::new(&declarations);

        let mut prompt = ScriptedPrompt::new(vec![
            ScriptedAnswer::Confirm(true),
            ScriptedAnswer::Text("test-name-2".to_string()),
        ]);
        let selection = selector.select(&request(&[], true), &mut prompt).unwrap();
        assert_eq!(
            names_of(&selection),
            vec![Some("test-name-1".to_string()), Some("test-name-2".to_string())]
        );
        assert!(selection.skipped.is_empty());

        let mut declining = ScriptedPrompt::new(vec![ScriptedAnswer::Confirm(false)]);
        let selection = selector.select(&request(&[], true), &mut declining).unwrap();
        assert_eq!(names_of(&selection), vec![Some("test-name-1".to_string())]);
        assert_eq!(selection.skipped.len(), 1);
        assert!(declining
            .transcript()
            .contains(&"Skipping unnamed deployment.".to_string()));
    }

    #[test]
    fn test_names_select_matching_and_report_missing() {
        let declarations = vec![
            declaration(Some("test-name-1")),
            declaration(None),
            declaration(Some("test-name-2")),
        ];
        let selector = DeploymentSelector::new(&declarations);

        let selection = selector
            .select(&request(&["test-name-2", "test-name-3"], false), &mut NonInteractive)
            .unwrap();
        assert_eq!(names_of(&selection), vec![Some("test-name-2".to_string())]);
        assert_eq!(selection.not_found, vec!["test-name-3".to_string()]);
        assert!(selection.warnings.is_empty());

        // 無名宣告永遠不會被名稱過濾選中；依檔案順序回傳
        let selection = selector
            .select(&request(&["test-name-2", "test-name-1"], true), &mut NonInteractive)
            .unwrap();
        assert_eq!(
            names_of(&selection),
            vec![Some("test-name-1".to_string()), Some("test-name-2".to_string())]
        );
    }

    #[test]
    fn test_nothing_found_yields_empty_selection() {
        let declarations = vec![declaration(Some("a")), declaration(Some("b"))];
        let selector = DeploymentSelector::new(&declarations);

        let selection = selector.select(&request(&["c"], false), &mut NonInteractive).unwrap();
        assert!(selection.candidates.is_empty());
        assert_eq!(selection.not_found, vec!["c".to_string()]);
    }

    #[test]
    fn test_overrides_ignored_for_multiple_targets() {
        let declarations = vec![declaration(Some("a")), declaration(Some("b"))];
        let selector = DeploymentSelector::new(&declarations);
        let mut req = request(&["a", "b"], false);
        req.overrides.work_pool = Some("cli-pool".to_string());
        req.overrides.schedule.interval = Some(42);

        let selection = selector.select(&req, &mut NonInteractive).unwrap();
        assert_eq!(selection.candidates.len(), 2);
        assert!(selection.warnings.contains(&IGNORED_OVERRIDES_WARNING.to_string()));
        for candidate in &selection.candidates {
            assert!(candidate.declaration.work_pool.name.is_none());
            assert!(candidate.cli_schedule.is_none());
        }
    }
}
