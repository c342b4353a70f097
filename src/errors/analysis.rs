use crate::any::TypeInfo;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisErrorKind {
    #[error("Constructor signature of {type_info} can't be introspected")]
    Uninspectable { type_info: TypeInfo },
    #[error("Constructor signature of {type_info} declares parameter `{name}` more than once")]
    DuplicateParameter { type_info: TypeInfo, name: &'static str },
}
