//! レコード検索フィルター
//!
//! グループとIDの許可/拒否リストを組み合わせる。全ての条件はAND

use crate::models::{Platform, StreamStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub platform: Option<Platform>,
    /// 空なら全状態（statusカラムを持つコレクションのみ有効）
    pub statuses: Vec<StreamStatus>,
    /// `Some(空)`は何にもマッチしない
    pub include_groups: Option<Vec<String>>,
    pub exclude_groups: Vec<String>,
    pub include_ids: Option<Vec<String>>,
    pub exclude_ids: Vec<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn platform(platform: Platform) -> Self {
        Self {
            platform: Some(platform),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[StreamStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn include_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_groups = Some(groups.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn include_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// WHERE句とバインド値を生成
    pub(crate) fn to_sql(&self, has_status_column: bool) -> (String, Vec<String>) {
        let mut clauses = Vec::new();
        let mut params = Vec::new();

        if let Some(platform) = self.platform {
            clauses.push("platform = ?".to_string());
            params.push(platform.as_str().to_string());
        }

        if has_status_column && !self.statuses.is_empty() {
            clauses.push(in_clause("status", self.statuses.len(), false));
            params.extend(self.statuses.iter().map(|s| s.as_str().to_string()));
        }

        push_list(&mut clauses, &mut params, "grp", self.include_groups.as_deref(), false);
        push_list(&mut clauses, &mut params, "grp", Some(self.exclude_groups.as_slice()), true);
        push_list(&mut clauses, &mut params, "id", self.include_ids.as_deref(), false);
        push_list(&mut clauses, &mut params, "id", Some(self.exclude_ids.as_slice()), true);

        if clauses.is_empty() {
            ("1 = 1".to_string(), params)
        } else {
            (clauses.join(" AND "), params)
        }
    }
}

fn push_list(
    clauses: &mut Vec<String>,
    params: &mut Vec<String>,
    column: &str,
    values: Option<&[String]>,
    negate: bool,
) {
    let Some(values) = values else {
        return;
    };

    if values.is_empty() {
        // 空の許可リストは何も通さない。空の拒否リストは条件なし
        if !negate {
            clauses.push("0 = 1".to_string());
        }
        return;
    }

    clauses.push(in_clause(column, values.len(), negate));
    params.extend(values.iter().cloned());
}

fn in_clause(column: &str, count: usize, negate: bool) -> String {
    let placeholders = vec!["?"; count].join(", ");
    if negate {
        format!("{} NOT IN ({})", column, placeholders)
    } else {
        format!("{} IN ({})", column, placeholders)
    }
}
