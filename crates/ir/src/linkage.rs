use std::fmt;

/// Linkage of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Linkage {
    /// The symbol is defined in the module, and can be referred to from the
    /// outside of the module.
    Public,

    #[default]
    /// The symbol is defined in the module, and can NOT be referred to from
    /// another module.
    Private,

    /// The symbol is declared in the module, and defined outside of it.
    /// Functions with external linkage carry no body.
    External,
}

impl Linkage {
    pub fn is_external(self) -> bool {
        matches!(self, Self::External)
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Public => write!(f, "public"),
            Self::Private => write!(f, "private"),
            Self::External => write!(f, "external"),
        }
    }
}
