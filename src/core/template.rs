use crate::domain::model::ValueMap;
use crate::utils::error::{DeployError, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub const DEFAULT_BLOCK_NAMESPACE: &str = "flowdeploy";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]*)\}\}").unwrap())
}

/// 單一部署處理期間累積的步驟輸出（只增不減）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateContext {
    values: ValueMap,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// 合併步驟輸出；同名輸出由後面的步驟覆蓋
    pub fn extend(&mut self, outputs: ValueMap) {
        for (key, value) in outputs {
            self.values.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

/// `{{ name }}` 佔位符渲染；block 參照原樣保留，由後端在 flow run 時解析
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRenderer {
    block_namespace: String,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_NAMESPACE)
    }
}

impl TemplateRenderer {
    pub fn new(block_namespace: impl Into<String>) -> Self {
        Self {
            block_namespace: block_namespace.into(),
        }
    }

    pub fn block_namespace(&self) -> &str {
        &self.block_namespace
    }

    /// `<namespace>.blocks.<type>.<name>[.<attribute>...]`
    pub fn is_block_reference(&self, expression: &str) -> bool {
        let segments: Vec<&str> = expression.trim().split('.').collect();

        segments.len() >= 4
            && segments[0] == self.block_namespace
            && segments[1] == "blocks"
            && segments
                .iter()
                .all(|s| !s.is_empty() && !s.chars().any(char::is_whitespace))
    }

    /// 渲染單一字串。整個字串恰為一個佔位符時保留輸出值的原始型別
    pub fn render_str(&self, template: &str, context: &TemplateContext) -> Result<Value> {
        let re = placeholder_regex();
        let trimmed = template.trim();

        if let Some(caps) = re.captures(trimmed) {
            let whole = caps.get(0).map(|m| m.as_str().len()).unwrap_or_default();
            if whole == trimmed.len() {
                let expression = caps[1].trim();
                if self.is_block_reference(expression) {
                    return Ok(Value::String(template.to_string()));
                }
                return self.lookup(expression, context).cloned();
            }
        }

        let mut rendered = String::with_capacity(template.len());
        let mut last = 0;

        for caps in re.captures_iter(template) {
            let Some(span) = caps.get(0) else {
                continue;
            };
            rendered.push_str(&template[last..span.start()]);

            let expression = caps[1].trim();
            if self.is_block_reference(expression) {
                rendered.push_str(span.as_str());
            } else {
                rendered.push_str(&stringify(self.lookup(expression, context)?));
            }

            last = span.end();
        }
        rendered.push_str(&template[last..]);

        Ok(Value::String(rendered))
    }

    /// 遞迴渲染 mapping / sequence 內的字串，其他葉節點原樣保留
    pub fn render_value(&self, value: &Value, context: &TemplateContext) -> Result<Value> {
        match value {
            Value::String(s) => self.render_str(s, context),
            Value::Array(items) => items
                .iter()
                .map(|item| self.render_value(item, context))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => self.render_map(map, context).map(Value::Object),
            other => Ok(other.clone()),
        }
    }

    pub fn render_map(&self, map: &ValueMap, context: &TemplateContext) -> Result<ValueMap> {
        let mut rendered = ValueMap::new();
        for (key, value) in map {
            rendered.insert(key.clone(), self.render_value(value, context)?);
        }
        Ok(rendered)
    }

    fn lookup<'a>(&self, expression: &str, context: &'a TemplateContext) -> Result<&'a Value> {
        context
            .get(expression)
            .ok_or_else(|| DeployError::UnresolvedPlaceholderError {
                key: expression.to_string(),
            })
    }
}

pub(crate) fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
