//! Sample region: employees, two saved reports and the standard view set

use anyhow::Result;
use rg_core::{GridConfig, Record, SettingsDocument, ViewSettings};
use rg_data::FieldDef;
use rg_views::{ChartView, RecordView, ViewRegistry};

const DEFAULT_CONFIG: &str = r#"{
    "regionId": "emp",
    "editable": true,
    "defaultView": "grid",
    "modelDefaults": { "pageSize": 25 },
    "fieldOverrides": { "EMPNO": { "isIdentity": true } }
}"#;

pub fn default_config() -> Result<GridConfig> {
    Ok(GridConfig::from_json_str(DEFAULT_CONFIG)?)
}

fn fields() -> Vec<FieldDef> {
    ["EMPNO", "ENAME", "JOB", "SAL", "DEPTNO"]
        .into_iter()
        .enumerate()
        .map(|(idx, name)| FieldDef::new(name, idx as u32 + 1))
        .collect()
}

pub fn registry() -> Result<ViewRegistry> {
    Ok(ViewRegistry::new()
        .with(Box::new(RecordView::grid(fields())))?
        .with(Box::new(RecordView::icon(fields())))?
        .with(Box::new(RecordView::detail(fields())))?
        .with(Box::new(RecordView::single_row(fields())))?
        .with(Box::new(ChartView::new()))?)
}

/// Views of a region that follows a department selection
pub fn detail_registry() -> Result<ViewRegistry> {
    Ok(ViewRegistry::new().with(Box::new(RecordView::detail(fields())))?)
}

pub fn employees() -> Vec<Record> {
    [
        (7369, "SMITH", "CLERK", 800, 20),
        (7499, "ALLEN", "SALESMAN", 1600, 30),
        (7566, "JONES", "MANAGER", 2975, 20),
        (7698, "BLAKE", "MANAGER", 2850, 30),
        (7782, "CLARK", "MANAGER", 2450, 10),
        (7839, "KING", "PRESIDENT", 5000, 10),
        (7900, "JAMES", "CLERK", 950, 30),
    ]
    .into_iter()
    .map(|(empno, ename, job, sal, deptno)| {
        Record::new(empno.to_string())
            .with_field("EMPNO", empno)
            .with_field("ENAME", ename)
            .with_field("JOB", job)
            .with_field("SAL", sal)
            .with_field("DEPTNO", deptno)
    })
    .collect()
}

/// Primary report showing every employee in the grid
pub fn primary_report() -> SettingsDocument {
    let mut document = SettingsDocument::new("EMP_PRIMARY", "grid");
    document.name = "Employees".into();
    document.views.insert(
        "grid".into(),
        ViewSettings::with_columns(["EMPNO", "ENAME", "JOB", "SAL", "DEPTNO"]),
    );
    document
        .views
        .insert("icon".into(), ViewSettings::with_columns(["ENAME", "JOB"]));
    document
}

/// Alternative report that opens in the detail view
pub fn managers_report() -> SettingsDocument {
    let mut document = SettingsDocument::new("EMP_MANAGERS", "detail");
    document.name = "Managers".into();
    document.views.insert(
        "detail".into(),
        ViewSettings::with_columns(["ENAME", "JOB", "SAL"]),
    );
    document
}
