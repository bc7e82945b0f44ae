use std::fmt;
use std::rc::Rc;

/// Result sort of a node. Booleans are bit-vectors of width one.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Sort {
    BitVec(u32),
    Array { index: u32, element: u32 },
    Fun { domain: Vec<u32>, codomain: u32 },
    /// Sort of an argument list, one width per argument.
    Tuple(Vec<u32>),
}

pub type SortRef = Rc<Sort>;

impl Sort {
    pub fn is_bitvec(&self) -> bool {
        matches!(self, Sort::BitVec(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Sort::BitVec(1))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Sort::Array { .. })
    }

    pub fn is_fun(&self) -> bool {
        matches!(self, Sort::Fun { .. })
    }

    pub fn get_width(&self) -> Option<u32> {
        match self {
            Sort::BitVec(w) => Some(*w),
            Sort::Array { element, .. } => Some(*element),
            Sort::Fun { codomain, .. } => Some(*codomain),
            Sort::Tuple(_) => None,
        }
    }

    pub fn get_index_width(&self) -> Option<u32> {
        match self {
            Sort::Array { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn get_arity(&self) -> Option<usize> {
        match self {
            Sort::Fun { domain, .. } => Some(domain.len()),
            _ => None,
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::BitVec(1) => write!(f, "Bool"),
            Sort::BitVec(w) => write!(f, "BitVec({})", w),
            Sort::Array { index, element } => write!(f, "Array({} -> {})", index, element),
            Sort::Fun { domain, codomain } => {
                let domain: Vec<String> = domain.iter().map(|w| w.to_string()).collect();
                write!(f, "Fun({} -> {})", domain.join(" "), codomain)
            }
            Sort::Tuple(widths) => {
                let widths: Vec<String> = widths.iter().map(|w| w.to_string()).collect();
                write!(f, "Tuple({})", widths.join(" "))
            }
        }
    }
}

pub fn bool_sort() -> SortRef {
    Rc::new(Sort::BitVec(1))
}

pub fn bitvec_sort(width: u32) -> SortRef {
    Rc::new(Sort::BitVec(width))
}

/// Function sort over bit-vector domain and codomain sorts, as used for
/// uninterpreted functions. Returns `None` if any of the sorts is not a bit-vector.
pub fn fun_sort(domain: &[SortRef], codomain: &SortRef) -> Option<SortRef> {
    let domain = domain
        .iter()
        .map(|s| match **s {
            Sort::BitVec(w) => Some(w),
            _ => None,
        })
        .collect::<Option<Vec<u32>>>()?;
    match **codomain {
        Sort::BitVec(codomain) if !domain.is_empty() => Some(Rc::new(Sort::Fun { domain, codomain })),
        _ => None,
    }
}
