use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("unknown constant `{name}`")]
    UnknownConstant { name: String },
    #[error("unknown free variable {fvar}")]
    UnknownFreeVar { fvar: String },
    #[error("function expected, found `{found}`")]
    FunctionExpected { found: String },
    #[error("sort expected, found `{found}`")]
    SortExpected { found: String },
    #[error("loose bound variable #{index}")]
    LooseBVar { index: u32 },
    #[error("hole outside of a cache key")]
    StrayHole,
    #[error("invalid '{attr}' use on `{name}`, only definitions can be marked as {attr}")]
    AttrOnNonDefinition { attr: &'static str, name: String },
    #[error("constant `{name}` has already been declared")]
    DuplicateConstant { name: String },
    #[error("declaration `{name}` contains free variables")]
    OpenDeclaration { name: String },
}

pub type Result<T> = std::result::Result<T, Error>;
