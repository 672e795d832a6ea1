//! The shared entity types that flow between every stage of the pipeline
//! (§3): `SourceFile` out of the collector, `ClassInfo`/`MethodInfo`/
//! `CallSite` out of the AST parser, `CallRelation`/`Endpoint`/`InheritNode`
//! out of the call-graph builder, `SqlQuery`/`SqlExtractionOutput` out of the
//! SQL extractors, `TableAccessInfo` out of the table-access analyzer, and
//! `ModificationContext` out of the batcher.
//!
//! Living in one crate (rather than one per producer) avoids a dependency
//! cycle: the table-access analyzer needs to retag `SourceFile`s the
//! collector produced, and the batcher needs every upstream type at once.
//! Every type here derives `Serialize`/`Deserialize` so it round-trips
//! through the `.applycrypto/` cache and result artifacts untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceFile {
    pub absolute_path: PathBuf,
    pub relative_path: PathBuf,
    pub filename: String,
    pub extension: String,
    pub size: u64,
    /// Unix millis; avoids pulling a time crate into the hot collector path
    /// only to re-serialize a timestamp nothing compares across runs.
    pub modified_time_millis: i64,
    /// Populated by `TableAccessAnalyzer`, empty at collection time. A set
    /// rather than a list so repeated tagging by more than one table is
    /// idempotent and always serializes in the same order (Testable
    /// Property 1).
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

impl SourceFile {
    pub fn tag(&mut self, table_name: impl Into<String>) {
        self.tags.insert(table_name.into());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessModifier {
    Public,
    Protected,
    Private,
    Package,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: String,
    pub field_type: String,
    #[serde(default)]
    pub annotations: Vec<String>,
    pub has_initializer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub param_type: String,
    pub is_varargs: bool,
}

/// A textual method-invocation site as seen by the AST walk, receiver not
/// yet resolved to a qualified name (that happens in `CallGraphBuilder`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallSite {
    pub receiver: Option<String>,
    pub method_name: String,
    pub line: u32,
    /// Argument count at the call site, used to prefer the arity-matching
    /// overload when a callee name resolves to more than one declared method
    /// (§4.6 case 1's "among matches, prefer the most-derived" still needs an
    /// arity filter first when a class overloads a method name).
    pub arg_count: u32,
}

/// A local variable declared inside a method body, `receiver_type` resolution
/// for call-site case 3 (§4.6): `UserRepository repo = ...; repo.findById(x)`
/// needs `repo`'s declared type to resolve `findById` against `UserRepository`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalVariable {
    pub name: String,
    pub var_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: String,
    pub return_type: String,
    pub parameters: Vec<Parameter>,
    pub access_modifier: AccessModifier,
    pub class_name: String,
    pub file_path: PathBuf,
    pub is_static: bool,
    pub is_abstract: bool,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub exceptions: Vec<String>,
    pub line_number: u32,
    pub end_line_number: u32,
    #[serde(default)]
    pub method_calls: Vec<CallSite>,
    #[serde(default)]
    pub local_variables: Vec<LocalVariable>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassInfo {
    pub name: String,
    pub package: Option<String>,
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    pub file_path: PathBuf,
    pub access_modifier: AccessModifier,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub fields: Vec<FieldInfo>,
    #[serde(default)]
    pub methods: Vec<MethodInfo>,
    #[serde(default)]
    pub inner_classes: Vec<ClassInfo>,
    pub is_interface: bool,
}

impl ClassInfo {
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) if !package.is_empty() => format!("{package}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// The inheritance forest node (§3): a thin projection of `ClassInfo` used
/// only for superclass/interface resolution, so `CallGraphBuilder` doesn't
/// need a full `ClassInfo` (with its method bodies) just to walk `extends`
/// chains.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InheritNode {
    pub name: String,
    pub package: Option<String>,
    pub superclass: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    pub file_path: PathBuf,
}

impl InheritNode {
    /// `package.name`, falling back to the bare `name` when `package` is
    /// absent — the same key `get_class_inherit_graph.py` uses to index its
    /// inheritance map.
    pub fn qualified_name(&self) -> String {
        match &self.package {
            Some(package) if !package.is_empty() => format!("{package}.{}", self.name),
            _ => self.name.clone(),
        }
    }
}

/// A resolved call edge produced by `CallGraphBuilder`. `caller`/`callee`
/// are fully-qualified `Class.method` strings; an unresolved callee still
/// gets a relation, qualified under the `<unresolved>` sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallRelation {
    pub caller: String,
    pub callee: String,
    pub caller_file: PathBuf,
    pub callee_file: Option<PathBuf>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    /// `@RequestMapping` with no explicit method, or a framework we don't
    /// have a detector for beyond "this is reachable from outside".
    Any,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    pub path: String,
    pub http_method: HttpMethod,
    pub method_signature: String,
    pub class_name: String,
    pub method_name: String,
    pub file_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, PartialOrd, Ord)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
}

impl QueryType {
    /// Tie-break order for `TableAccessInfo::query_type` majority voting
    /// (§4.7): INSERT beats UPDATE beats DELETE beats SELECT.
    pub fn tie_break_rank(self) -> u8 {
        match self {
            QueryType::Insert => 0,
            QueryType::Update => 1,
            QueryType::Delete => 2,
            QueryType::Select => 3,
        }
    }
}

/// Strategy-specific metadata a `SqlQuery` carries alongside its flattened
/// SQL text. MyBatis queries carry namespace/result-type context the JDBC
/// and JPA extractors have no equivalent for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct MyBatisMeta {
    pub namespace: String,
    pub parameter_type: Option<String>,
    pub result_type: Option<String>,
    pub resolved_dynamic: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum SqlQueryMeta {
    MyBatis(MyBatisMeta),
    /// JDBC/JPA: the originating method signature is the only extra context
    /// (there is no mapper-XML namespace to carry).
    Method { signature: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlQuery {
    pub id: String,
    pub query_type: QueryType,
    pub sql: String,
    pub meta: SqlQueryMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SqlExtractionOutput {
    pub file: PathBuf,
    pub sql_queries: Vec<SqlQuery>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnAccess {
    pub name: String,
    #[serde(default)]
    pub new_column: bool,
    pub crypto_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryCallStacks {
    pub id: String,
    pub sql: String,
    pub query_type: QueryType,
    /// Each inner list is one root-to-sink call stack, root first.
    pub call_stacks: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableAccessInfo {
    pub table_name: String,
    pub columns: Vec<ColumnAccess>,
    pub access_files: Vec<PathBuf>,
    pub query_type: QueryType,
    pub layer: String,
    pub layer_files: std::collections::BTreeMap<String, Vec<PathBuf>>,
    pub sql_queries: Vec<QueryCallStacks>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModificationContext {
    pub file_paths: Vec<PathBuf>,
    pub context_files: Vec<PathBuf>,
    pub table_name: String,
    pub columns: Vec<ColumnAccess>,
    pub file_count: usize,
    pub layer: String,
    /// Schema version of this context artifact (ambient addition, not a
    /// spec.md field) so a stale `.applycrypto/results/*.json` left over
    /// from an older build is rejected rather than silently misread.
    pub generated_at_schema: u32,
}
