//! Default layer classification by class-name suffix (§4.6). A configurable
//! rule set is named in the design but only the Spring-MVC-style defaults are
//! implemented as a built-in detector; other framework strategies are
//! declared, not implemented (§4.6's "pluggable but stub").

const CONTROLLER_SUFFIXES: &[&str] = &["Controller", "CTL"];
const SERVICE_SUFFIXES: &[&str] = &["Service", "SVC", "SVCImpl", "BIZ"];
const REPOSITORY_SUFFIXES: &[&str] = &["DAO", "Repository", "DQM", "DEM", "Mapper"];
const VALUE_OBJECT_SUFFIXES: &[&str] = &["VO", "DVO", "BVO", "SVO", "DTO", "Entity"];

pub const LAYER_CONTROLLER: &str = "Controller";
pub const LAYER_SERVICE: &str = "Service";
pub const LAYER_REPOSITORY: &str = "Repository";
pub const LAYER_VALUE_OBJECT: &str = "ValueObject";
pub const LAYER_UNKNOWN: &str = "Unknown";

/// Classifies a class's layer by name suffix. Declared order matters only in
/// the (rare) case a class name matches more than one family's suffix list.
pub fn classify_layer(class_name: &str) -> &'static str {
    if ends_with_any(class_name, CONTROLLER_SUFFIXES) {
        LAYER_CONTROLLER
    } else if ends_with_any(class_name, SERVICE_SUFFIXES) {
        LAYER_SERVICE
    } else if ends_with_any(class_name, REPOSITORY_SUFFIXES) {
        LAYER_REPOSITORY
    } else if ends_with_any(class_name, VALUE_OBJECT_SUFFIXES) {
        LAYER_VALUE_OBJECT
    } else {
        LAYER_UNKNOWN
    }
}

/// The Service sub-label (`SVCImpl`/`BIZ`) context-batching strategies route
/// on (§4.8), distinct from the coarse `Service` layer. `BIZUtil`-suffixed
/// helper classes are explicitly excluded, matching the original Banka
/// generator's method-charging scope.
pub fn sub_label(class_name: &str) -> Option<&'static str> {
    if class_name.ends_with("SVCImpl") {
        Some("SVCImpl")
    } else if class_name.ends_with("BIZ") && !class_name.ends_with("BIZUtil") {
        Some("BIZ")
    } else {
        None
    }
}

fn ends_with_any(name: &str, suffixes: &[&str]) -> bool {
    suffixes.iter().any(|suffix| name.ends_with(suffix))
}
