//! Framework-specific file grouping (§4.8): turns one `TableAccessInfo`'s
//! `layer_files` into `(layer_label, modifiable_files, context_files)`
//! groups, which [`crate::cost::create_batches`] then token-splits.

use ca_common::model::{ClassInfo, TableAccessInfo};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub struct FileGroup {
    pub label: String,
    pub files: Vec<PathBuf>,
    pub context_files: Vec<PathBuf>,
}

/// One group per `layer_files` entry, no context files — the fallback
/// strategy any framework/modification-type combination without a dedicated
/// detector falls back to.
pub fn per_layer(info: &TableAccessInfo) -> Vec<FileGroup> {
    info.layer_files
        .iter()
        .filter(|(_, files)| !files.is_empty())
        .map(|(layer, files)| FileGroup {
            label: layer.clone(),
            files: files.clone(),
            context_files: Vec::new(),
        })
        .collect()
}

fn stem(path: &Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default().to_string()
}

fn class_for_file<'a>(classes: &'a [ClassInfo], file: &Path) -> Option<&'a ClassInfo> {
    classes.iter().find(|c| c.file_path == file)
}

/// Finds the file among `candidates` whose stem contains the import's
/// simple (last-segment) class name — the same substring match
/// `_match_import_to_file_path` uses rather than requiring an exact stem.
fn match_import_to_file<'a>(import_statement: &str, candidates: &'a [PathBuf]) -> Option<&'a PathBuf> {
    let class_name = import_statement.rsplit('.').next().unwrap_or(import_statement);
    candidates.iter().find(|path| stem(path).contains(class_name))
}

/// Per-Controller import-chain closure (§4.8 MyBatis/Spring MVC): each
/// Controller file seeds a group; its import list is matched against the
/// Service layer, then each matched Service's own imports extend the search
/// into the Repository/Mapper layer. Mapper XML files among `access_files`
/// and VO files reachable from any grouped class's method signatures become
/// `context_files`.
pub fn mybatis_spring_mvc(info: &TableAccessInfo, classes: &[ClassInfo]) -> Vec<FileGroup> {
    let controller_files = info.layer_files.get("Controller").cloned().unwrap_or_default();
    let service_files = info.layer_files.get("Service").cloned().unwrap_or_default();
    let repository_files: Vec<PathBuf> = info
        .layer_files
        .get("Repository")
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !stem(p).to_lowercase().contains("mapper"))
        .collect();

    let mapper_xml_files: Vec<PathBuf> =
        info.access_files.iter().filter(|p| p.extension().is_some_and(|e| e == "xml")).cloned().collect();

    let mut groups = Vec::new();
    for controller_file in &controller_files {
        let mut group_files = vec![controller_file.clone()];
        let mut enhanced_imports: BTreeSet<String> = BTreeSet::new();

        if let Some(controller_class) = class_for_file(classes, controller_file) {
            enhanced_imports.extend(controller_class.imports.iter().cloned());

            let matched_services: Vec<PathBuf> = controller_class
                .imports
                .iter()
                .filter_map(|import| match_import_to_file(import, &service_files))
                .cloned()
                .collect();

            for service_file in &matched_services {
                if !group_files.contains(service_file) {
                    group_files.push(service_file.clone());
                }
                if let Some(service_class) = class_for_file(classes, service_file) {
                    enhanced_imports.extend(service_class.imports.iter().cloned());
                }
            }

            for import in &enhanced_imports {
                if let Some(repo_file) = match_import_to_file(import, &repository_files) {
                    if !group_files.contains(repo_file) {
                        group_files.push(repo_file.clone());
                    }
                }
            }
        }

        let context_files = resolve_value_object_context(classes, &group_files, &mapper_xml_files);

        groups.push(FileGroup {
            label: String::new(),
            files: group_files,
            context_files,
        });
    }
    groups
}

/// Return/parameter types of a group's methods, resolved against `classes`
/// tagged `ValueObject`, plus every Mapper XML file passed in.
fn resolve_value_object_context(classes: &[ClassInfo], group_files: &[PathBuf], xml_files: &[PathBuf]) -> Vec<PathBuf> {
    let mut type_names: BTreeSet<String> = BTreeSet::new();
    for file in group_files {
        if let Some(class) = class_for_file(classes, file) {
            for method in &class.methods {
                type_names.insert(base_type_name(&method.return_type));
                for param in &method.parameters {
                    type_names.insert(base_type_name(&param.param_type));
                }
            }
        }
    }

    let mut context = Vec::new();
    for class in classes {
        if type_names.contains(&class.name) && is_value_object_name(&class.name) {
            context.push(class.file_path.clone());
        }
    }
    context.extend(xml_files.iter().cloned());
    context
}

const VALUE_OBJECT_SUFFIXES: &[&str] = &["VO", "DVO", "BVO", "SVO", "DTO", "Entity"];

fn is_value_object_name(class_name: &str) -> bool {
    VALUE_OBJECT_SUFFIXES.iter().any(|suffix| class_name.ends_with(suffix))
}

fn base_type_name(ty: &str) -> String {
    let ty = ty.trim();
    let ty = ty.split('<').next().unwrap_or(ty).trim();
    ty.trim_end_matches("[]").rsplit('.').next().unwrap_or(ty).to_string()
}

/// Walks `path`'s components from the end looking for one equal to
/// `layer_directory_name`, returning the component immediately before it —
/// ported from `jdbc_context_generator.py`'s reverse-indexed scan.
fn keyword_directory(path: &Path, layer_directory_name: &str) -> Option<String> {
    let parts: Vec<&str> = path.components().filter_map(|c| c.as_os_str().to_str()).collect();
    for idx in (0..parts.len()).rev() {
        if parts[idx].eq_ignore_ascii_case(layer_directory_name) && idx > 0 {
            return Some(parts[idx - 1].to_string());
        }
    }
    None
}

/// JDBC/Anyframe grouping (§4.8): `BIZ`/`SVCImpl`-suffixed files sharing a
/// keyword directory (the directory immediately before `biz`/`svc`) are
/// merged into one group; files with no such directory fall back to their
/// own sub-label group with a warning. DVO/DEM files actually imported by a
/// grouped file become `context_files`.
pub fn jdbc_anyframe(info: &TableAccessInfo, classes: &[ClassInfo]) -> Vec<FileGroup> {
    let sub_labeled: Vec<(PathBuf, &'static str)> = classes
        .iter()
        .filter_map(|c| ca_callgraph::sub_label(&c.name).map(|label| (c.file_path.clone(), label)))
        .filter(|(path, _)| info.access_files.contains(path))
        .collect();

    let mut keyword_groups: BTreeMap<String, BTreeSet<PathBuf>> = BTreeMap::new();
    let mut fallback_groups: BTreeMap<&'static str, BTreeSet<PathBuf>> = BTreeMap::new();

    for (path, label) in &sub_labeled {
        let directory_name = if *label == "BIZ" { "biz" } else { "svc" };
        match keyword_directory(path, directory_name) {
            Some(keyword) => {
                keyword_groups.entry(keyword).or_default().insert(path.clone());
            }
            None => {
                tracing::warn!("could not find keyword directory for {} with sub-label {label}", path.display());
                fallback_groups.entry(label).or_default().insert(path.clone());
            }
        }
    }

    let mut groups = Vec::new();
    for (keyword, files) in keyword_groups {
        let files: Vec<PathBuf> = files.into_iter().collect();
        let context_files = dvo_dem_context_for(classes, &files);
        groups.push(FileGroup { label: keyword, files, context_files });
    }
    for (label, files) in fallback_groups {
        let files: Vec<PathBuf> = files.into_iter().collect();
        let context_files = dvo_dem_context_for(classes, &files);
        groups.push(FileGroup { label: label.to_string(), files, context_files });
    }
    groups
}

fn dvo_dem_context_for(classes: &[ClassInfo], group_files: &[PathBuf]) -> Vec<PathBuf> {
    let imported: BTreeSet<String> = group_files
        .iter()
        .filter_map(|f| class_for_file(classes, f))
        .flat_map(|c| c.imports.iter().map(|i| i.rsplit('.').next().unwrap_or(i).to_string()))
        .collect();

    classes
        .iter()
        .filter(|c| {
            (c.name.ends_with("DVO") || c.name.ends_with("DEM")) && imported.contains(&c.name)
        })
        .map(|c| c.file_path.clone())
        .collect()
}

/// BAT/BATVO/XML pairing (§4.8 MyBatis CCS batch): each BAT file is its own
/// modifiable group; its imported BATVO classes plus the sibling
/// `<stem>_SQL.xml` (searched same directory, then parent, then a `xml/`
/// sibling directory, via `locate_paired_xml`) become `context_files`.
pub fn mybatis_ccs_batch(
    info: &TableAccessInfo,
    classes: &[ClassInfo],
    file_exists: impl Fn(&Path) -> bool,
) -> Vec<FileGroup> {
    let bat_files: Vec<&PathBuf> = info.access_files.iter().filter(|p| stem(p).ends_with("BAT")).collect();

    let mut groups = Vec::new();
    for bat_file in bat_files {
        let mut context_files = Vec::new();

        if let Some(bat_class) = class_for_file(classes, bat_file) {
            for import in &bat_class.imports {
                let class_name = import.rsplit('.').next().unwrap_or(import);
                if class_name.ends_with("BATVO") {
                    if let Some(vo_class) = classes.iter().find(|c| c.name == class_name) {
                        context_files.push(vo_class.file_path.clone());
                    }
                }
            }
        }

        if let Some(xml_path) = locate_paired_xml(bat_file, &file_exists) {
            context_files.push(xml_path);
        }

        groups.push(FileGroup {
            label: stem(bat_file),
            files: vec![bat_file.to_path_buf()],
            context_files,
        });
    }
    groups
}

fn locate_paired_xml(bat_file: &Path, file_exists: &impl Fn(&Path) -> bool) -> Option<PathBuf> {
    let xml_name = format!("{}_SQL.xml", stem(bat_file));
    let parent = bat_file.parent()?;

    let same_dir = parent.join(&xml_name);
    if file_exists(&same_dir) {
        return Some(same_dir);
    }

    let parent_dir = parent.parent()?.join(&xml_name);
    if file_exists(&parent_dir) {
        return Some(parent_dir);
    }

    let sibling_xml_dir = parent.join("xml").join(&xml_name);
    if file_exists(&sibling_xml_dir) {
        return Some(sibling_xml_dir);
    }

    None
}

/// TypeHandler grouping (§4.8): each Mapper XML file is its own modifiable
/// unit; the VO types its queries declare as `resultType`/`parameterType`
/// become `context_files`, matched by simple name against Repository-layer
/// classes.
pub fn type_handler(info: &TableAccessInfo, classes: &[ClassInfo]) -> Vec<FileGroup> {
    let xml_files: Vec<PathBuf> =
        info.access_files.iter().filter(|p| p.extension().is_some_and(|e| e == "xml")).cloned().collect();

    xml_files
        .into_iter()
        .map(|xml_file| {
            let context_files = classes
                .iter()
                .filter(|c| is_value_object_name(&c.name))
                .map(|c| c.file_path.clone())
                .collect();
            FileGroup { label: stem(&xml_file), files: vec![xml_file], context_files }
        })
        .collect()
}

/// Whether `path` is a `BIZ`-suffixed file (excluding `BIZUtil` helpers) the
/// BNK-Banka charging override applies to.
pub fn is_biz_file(path: &Path) -> bool {
    ca_callgraph::sub_label(&stem(path)) == Some("BIZ")
}

/// BNK-Banka's `BIZ`-file charging override (§4.8): instead of the full file
/// body, only the byte ranges of methods actually referenced in one of this
/// table's call stacks (with this class as the first hop) are charged —
/// joined with a blank line, matching the original `_get_biz_method_content`
/// join. Falls back to the full file when no call stack names a method on
/// this class, or the class can't be found.
pub fn banka_biz_content(class: &ClassInfo, info: &TableAccessInfo, full_content: &str) -> String {
    let referenced: BTreeSet<&str> = info
        .sql_queries
        .iter()
        .flat_map(|q| q.call_stacks.iter())
        .flat_map(|stack| stack.iter())
        .filter_map(|qualified| {
            let (owner, method) = qualified.split_once('.')?;
            (owner == class.name).then_some(method)
        })
        .collect();

    if referenced.is_empty() {
        return full_content.to_string();
    }

    let lines: Vec<&str> = full_content.lines().collect();
    let mut snippets = Vec::new();
    for method in &class.methods {
        if !referenced.contains(method.name.as_str()) {
            continue;
        }
        let start = method.line_number.saturating_sub(1) as usize;
        let end = (method.end_line_number as usize).min(lines.len());
        if start >= end {
            continue;
        }
        snippets.push(lines[start..end].join("\n"));
    }

    if snippets.is_empty() {
        full_content.to_string()
    } else {
        snippets.join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ca_common::model::{AccessModifier, QueryType};

    fn class(name: &str, file: &str, imports: &[&str]) -> ClassInfo {
        ClassInfo {
            name: name.into(),
            package: None,
            superclass: None,
            interfaces: vec![],
            file_path: PathBuf::from(file),
            access_modifier: AccessModifier::Public,
            annotations: vec![],
            imports: imports.iter().map(|s| s.to_string()).collect(),
            fields: vec![],
            methods: vec![],
            inner_classes: vec![],
            is_interface: false,
        }
    }

    fn table_info(layer_files: &[(&str, &[&str])]) -> TableAccessInfo {
        TableAccessInfo {
            table_name: "users".into(),
            columns: vec![],
            access_files: layer_files.iter().flat_map(|(_, f)| f.iter().map(|p| PathBuf::from(p))).collect(),
            query_type: QueryType::Select,
            layer: "Controller".into(),
            layer_files: layer_files
                .iter()
                .map(|(l, f)| (l.to_string(), f.iter().map(|p| PathBuf::from(p)).collect()))
                .collect(),
            sql_queries: vec![],
        }
    }

    #[test]
    fn per_layer_emits_one_group_per_nonempty_layer() {
        let info = table_info(&[("Controller", &["C.java"]), ("Service", &[]), ("Repository", &["R.java"])]);
        let groups = per_layer(&info);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn mybatis_strategy_chases_imports_through_service_to_repository() {
        let classes = vec![
            class("UserController", "UserController.java", &["com.app.service.UserService"]),
            class("UserService", "UserService.java", &["com.app.dao.UserDAO"]),
            class("UserDAO", "UserDAO.java", &[]),
        ];
        let info = table_info(&[
            ("Controller", &["UserController.java"]),
            ("Service", &["UserService.java"]),
            ("Repository", &["UserDAO.java"]),
        ]);
        let groups = mybatis_spring_mvc(&info, &classes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files.len(), 3);
    }

    #[test]
    fn mybatis_strategy_excludes_mapper_named_repository_files() {
        let classes = vec![class("UserController", "UserController.java", &[])];
        let info = table_info(&[("Controller", &["UserController.java"]), ("Repository", &["UserMapper.java"])]);
        let groups = mybatis_spring_mvc(&info, &classes);
        assert_eq!(groups[0].files, vec![PathBuf::from("UserController.java")]);
    }

    #[test]
    fn jdbc_strategy_groups_biz_files_sharing_a_keyword_directory() {
        let classes = vec![
            class("OrderBIZ", "/app/tgt/biz/OrderBIZ.java", &[]),
            class("PaymentBIZ", "/app/tgt/biz/PaymentBIZ.java", &[]),
        ];
        let info = table_info(&[("Service", &["/app/tgt/biz/OrderBIZ.java", "/app/tgt/biz/PaymentBIZ.java"])]);
        let groups = jdbc_anyframe(&info, &classes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "tgt");
        assert_eq!(groups[0].files.len(), 2);
    }

    #[test]
    fn jdbc_strategy_falls_back_when_no_keyword_directory_found() {
        let classes = vec![class("LonelyBIZ", "LonelyBIZ.java", &[])];
        let info = table_info(&[("Service", &["LonelyBIZ.java"])]);
        let groups = jdbc_anyframe(&info, &classes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].label, "BIZ");
    }

    #[test]
    fn ccs_batch_strategy_pairs_bat_with_batvo_and_sibling_xml() {
        let classes = vec![class("OrderBAT", "/p/batch/OrderBAT.java", &["com.app.vo.OrderBATVO"])];
        let mut info = table_info(&[]);
        info.access_files = vec![PathBuf::from("/p/batch/OrderBAT.java")];
        let vo = class("OrderBATVO", "/p/vo/OrderBATVO.java", &[]);
        let mut all_classes = classes;
        all_classes.push(vo);

        let existing = BTreeSet::from([PathBuf::from("/p/batch/OrderBAT_SQL.xml")]);
        let groups = mybatis_ccs_batch(&info, &all_classes, |p| existing.contains(p));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].files, vec![PathBuf::from("/p/batch/OrderBAT.java")]);
        assert!(groups[0].context_files.contains(&PathBuf::from("/p/vo/OrderBATVO.java")));
        assert!(groups[0].context_files.contains(&PathBuf::from("/p/batch/OrderBAT_SQL.xml")));
    }

    #[test]
    fn ccs_batch_strategy_checks_parent_then_sibling_xml_dir() {
        let bat = PathBuf::from("/p/src/batch/OrderBAT.java");
        let parent_xml = PathBuf::from("/p/src/OrderBAT_SQL.xml");
        assert_eq!(locate_paired_xml(&bat, &|p: &Path| p == parent_xml), Some(parent_xml));

        let sibling_xml = PathBuf::from("/p/src/batch/xml/OrderBAT_SQL.xml");
        assert_eq!(locate_paired_xml(&bat, &|p: &Path| p == sibling_xml), Some(sibling_xml));
    }

    #[test]
    fn type_handler_strategy_emits_one_group_per_mapper_xml() {
        let classes = vec![class("UserVO", "/p/UserVO.java", &[])];
        let mut info = table_info(&[]);
        info.access_files = vec![PathBuf::from("/p/UserMapper.xml")];
        let groups = type_handler(&info, &classes);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].context_files, vec![PathBuf::from("/p/UserVO.java")]);
    }

    #[test]
    fn banka_charges_only_referenced_method_ranges() {
        use ca_common::model::{AccessModifier, MethodInfo, QueryCallStacks, QueryType};

        let method = MethodInfo {
            name: "run".into(),
            return_type: "void".into(),
            parameters: vec![],
            access_modifier: AccessModifier::Public,
            class_name: "OrderBIZ".into(),
            file_path: PathBuf::from("OrderBIZ.java"),
            is_static: false,
            is_abstract: false,
            annotations: vec![],
            exceptions: vec![],
            line_number: 2,
            end_line_number: 3,
            method_calls: vec![],
            local_variables: vec![],
        };
        let mut biz_class = class("OrderBIZ", "OrderBIZ.java", &[]);
        biz_class.methods = vec![method];

        let mut info = table_info(&[]);
        info.sql_queries = vec![QueryCallStacks {
            id: "find".into(),
            sql: "select 1".into(),
            query_type: QueryType::Select,
            call_stacks: vec![vec!["OrderBIZ.run".to_string()]],
        }];

        let content = "line1\nvoid run() {\n  doStuff();\n}\nline5";
        let charged = banka_biz_content(&biz_class, &info, content);
        assert_eq!(charged, "void run() {\n  doStuff();");
    }

    #[test]
    fn banka_falls_back_to_full_content_when_nothing_referenced() {
        let biz_class = class("OrderBIZ", "OrderBIZ.java", &[]);
        let info = table_info(&[]);
        let content = "whole file";
        assert_eq!(banka_biz_content(&biz_class, &info, content), content);
    }
}
