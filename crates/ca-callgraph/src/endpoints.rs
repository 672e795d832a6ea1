//! Spring MVC endpoint detection (§4.6): a `@Controller`/`@RestController`
//! class contributes one [`Endpoint`] per method carrying a mapping
//! annotation, path = class-route ∪ method-route, empty class-route defaults
//! to `/`.

use ca_common::model::{ClassInfo, Endpoint, HttpMethod, MethodInfo};
use regex::Regex;
use std::sync::OnceLock;

const CONTROLLER_ANNOTATIONS: &[&str] = &["@Controller", "@RestController"];

const METHOD_MAPPINGS: &[(&str, HttpMethod)] = &[
    ("@GetMapping", HttpMethod::Get),
    ("@PostMapping", HttpMethod::Post),
    ("@PutMapping", HttpMethod::Put),
    ("@DeleteMapping", HttpMethod::Delete),
    ("@PatchMapping", HttpMethod::Patch),
];

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?:value|path)?\s*=?\s*"([^"]*)""#).expect("valid regex")
    })
}

fn request_method_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"RequestMethod\.(GET|POST|PUT|DELETE|PATCH)").expect("valid regex"))
}

pub fn detect_endpoints(classes: &[ClassInfo]) -> Vec<Endpoint> {
    let mut out = Vec::new();
    for class in classes {
        collect_from_class(class, &mut out);
    }
    out
}

fn collect_from_class(class: &ClassInfo, out: &mut Vec<Endpoint>) {
    if is_controller(class) {
        let class_path = class
            .annotations
            .iter()
            .find(|a| a.trim_start().starts_with("@RequestMapping"))
            .and_then(|a| first_path(a))
            .unwrap_or_default();

        for method in &class.methods {
            if let Some((http_method, method_path)) = mapping_annotation(method) {
                let path = join_paths(&class_path, &method_path);
                out.push(Endpoint {
                    path,
                    http_method,
                    method_signature: format!("{}({})", method.name, method.parameters.len()),
                    class_name: class.name.clone(),
                    method_name: method.name.clone(),
                    file_path: method.file_path.clone(),
                });
            }
        }
    }
    for inner in &class.inner_classes {
        collect_from_class(inner, out);
    }
}

fn is_controller(class: &ClassInfo) -> bool {
    class
        .annotations
        .iter()
        .any(|a| CONTROLLER_ANNOTATIONS.iter().any(|c| a.trim_start().starts_with(c)))
}

fn mapping_annotation(method: &MethodInfo) -> Option<(HttpMethod, String)> {
    for annotation in &method.annotations {
        let trimmed = annotation.trim_start();
        for (name, http_method) in METHOD_MAPPINGS {
            if trimmed.starts_with(name) {
                return Some((*http_method, first_path(annotation).unwrap_or_default()));
            }
        }
        if trimmed.starts_with("@RequestMapping") {
            let http_method = request_method_pattern()
                .captures(annotation)
                .and_then(|caps| match &caps[1] {
                    "GET" => Some(HttpMethod::Get),
                    "POST" => Some(HttpMethod::Post),
                    "PUT" => Some(HttpMethod::Put),
                    "DELETE" => Some(HttpMethod::Delete),
                    "PATCH" => Some(HttpMethod::Patch),
                    _ => None,
                })
                .unwrap_or(HttpMethod::Any);
            return Some((http_method, first_path(annotation).unwrap_or_default()));
        }
    }
    None
}

fn first_path(annotation: &str) -> Option<String> {
    path_pattern().captures(annotation).map(|caps| caps[1].to_string())
}

/// Joins a class-level route and a method-level route into one normalized
/// path, collapsing the doubled `/` at the seam. An empty class route
/// defaults to `/`.
fn join_paths(class_path: &str, method_path: &str) -> String {
    let class_path = if class_path.is_empty() { "/" } else { class_path };
    let mut joined = String::new();
    joined.push_str(class_path.trim_end_matches('/'));
    if !method_path.is_empty() {
        if !method_path.starts_with('/') {
            joined.push('/');
        }
        joined.push_str(method_path);
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}
