use std::collections::BTreeMap;
use std::fmt;

/// Mutable view onto a parameter owned by a model object.
pub enum Addressable<'a> {
    Single(&'a mut f64),
    Vector(&'a mut Vec<f64>),
    YearMap(&'a mut BTreeMap<u32, f64>),
}

/// Which part of an addressable a handle writes to. Resolved once when the model is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Single,
    /// Zero-based vector element
    Element(usize),
    Year(u32),
    /// Every element of a vector or year map
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Process(usize),
    Selectivity(usize),
    Observation(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressHandle {
    pub target: Target,
    pub name: String,
    pub shape: Shape,
}

impl<'a> Addressable<'a> {
    /// Checks that `shape` can be used against this addressable.
    pub fn check(&self, shape: Shape) -> Result<(), String> {
        match (self, shape) {
            (Addressable::Single(_), Shape::Single) => Ok(()),
            (Addressable::Vector(v), Shape::Element(i)) if i < v.len() => Ok(()),
            (Addressable::Vector(v), Shape::Element(i)) => Err(format!(
                "index {} is out of range, the parameter has {} values",
                i + 1,
                v.len()
            )),
            (Addressable::YearMap(m), Shape::Year(y)) if m.contains_key(&y) => Ok(()),
            (Addressable::YearMap(_), Shape::Year(y)) => {
                Err(format!("year {} is not defined for this parameter", y))
            }
            (Addressable::Vector(_), Shape::All) | (Addressable::YearMap(_), Shape::All) => Ok(()),
            (Addressable::Single(_), _) => Err("parameter holds a single value".to_string()),
            (Addressable::Vector(_), _) => {
                Err("parameter is a vector, use name(index) to address one value".to_string())
            }
            (Addressable::YearMap(_), _) => {
                Err("parameter is indexed by year, use name{year} to address one value".to_string())
            }
        }
    }

    pub fn read(&self, shape: Shape) -> Option<f64> {
        match (self, shape) {
            (Addressable::Single(v), Shape::Single) => Some(**v),
            (Addressable::Vector(v), Shape::Element(i)) => v.get(i).copied(),
            (Addressable::Vector(v), Shape::All) => v.first().copied(),
            (Addressable::YearMap(m), Shape::Year(y)) => m.get(&y).copied(),
            (Addressable::YearMap(m), Shape::All) => m.values().next().copied(),
            _ => None,
        }
    }

    pub fn assign(self, shape: Shape, value: f64) -> Result<(), String> {
        self.check(shape)?;
        match (self, shape) {
            (Addressable::Single(v), Shape::Single) => *v = value,
            (Addressable::Vector(v), Shape::Element(i)) => v[i] = value,
            (Addressable::Vector(v), Shape::All) => v.iter_mut().for_each(|x| *x = value),
            (Addressable::YearMap(m), Shape::Year(y)) => {
                m.insert(y, value);
            }
            (Addressable::YearMap(m), Shape::All) => m.values_mut().for_each(|x| *x = value),
            _ => unreachable!("shape was checked above"),
        }
        Ok(())
    }
}

/// A parsed `type[label].name` address with an optional `(index)` or `{year}` suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterPath {
    pub object_type: String,
    pub label: String,
    pub name: String,
    pub shape: Shape,
}

impl ParameterPath {
    pub fn parse(path: &str) -> Result<Self, String> {
        let open = path
            .find('[')
            .ok_or_else(|| format!("'{}' is missing the [label] part", path))?;
        let close = path
            .find(']')
            .filter(|c| *c > open)
            .ok_or_else(|| format!("'{}' has an unterminated [label]", path))?;
        let object_type = path[..open].trim();
        let label = path[open + 1..close].trim();
        let rest = path[close + 1..]
            .strip_prefix('.')
            .ok_or_else(|| format!("'{}' must continue with .parameter after the label", path))?;

        if object_type.is_empty() || label.is_empty() || rest.is_empty() {
            return Err(format!("'{}' is not of the form type[label].parameter", path));
        }

        let (name, shape) = if let Some((name, idx)) = rest.split_once('(') {
            let idx = idx
                .strip_suffix(')')
                .ok_or_else(|| format!("'{}' has an unterminated (index)", path))?;
            let idx: usize = idx
                .trim()
                .parse()
                .map_err(|_| format!("'{}' has a non-numeric index", path))?;
            if idx == 0 {
                return Err(format!("'{}' indexes start at 1", path));
            }
            (name, Shape::Element(idx - 1))
        } else if let Some((name, year)) = rest.split_once('{') {
            let year = year
                .strip_suffix('}')
                .ok_or_else(|| format!("'{}' has an unterminated {{year}}", path))?;
            let year: u32 = year
                .trim()
                .parse()
                .map_err(|_| format!("'{}' has a non-numeric year", path))?;
            (name, Shape::Year(year))
        } else {
            (rest, Shape::Single)
        };

        Ok(Self {
            object_type: object_type.to_string(),
            label: label.to_string(),
            name: name.trim().to_string(),
            shape,
        })
    }
}

impl fmt::Display for ParameterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}].{}", self.object_type, self.label, self.name)?;
        match self.shape {
            Shape::Element(i) => write!(f, "({})", i + 1),
            Shape::Year(y) => write!(f, "{{{}}}", y),
            Shape::Single | Shape::All => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_suffixes() {
        let p = ParameterPath::parse("process[Recruitment].r0").unwrap();
        assert_eq!(p.object_type, "process");
        assert_eq!(p.label, "Recruitment");
        assert_eq!(p.shape, Shape::Single);

        let p = ParameterPath::parse("process[Recruitment].proportions(2)").unwrap();
        assert_eq!(p.shape, Shape::Element(1));

        let p = ParameterPath::parse("process[Fishing].catches{2001}").unwrap();
        assert_eq!(p.name, "catches");
        assert_eq!(p.shape, Shape::Year(2001));
        assert_eq!(p.to_string(), "process[Fishing].catches{2001}");
    }

    #[test]
    fn rejects_malformed_paths() {
        assert!(ParameterPath::parse("process.r0").is_err());
        assert!(ParameterPath::parse("process[R]r0").is_err());
        assert!(ParameterPath::parse("process[R].p(0)").is_err());
        assert!(ParameterPath::parse("process[R].c{x}").is_err());
    }

    #[test]
    fn year_map_shapes_are_checked() {
        let mut map: BTreeMap<u32, f64> = [(2000, 1.0), (2001, 2.0)].into_iter().collect();
        assert!(Addressable::YearMap(&mut map).check(Shape::Year(1999)).is_err());
        Addressable::YearMap(&mut map)
            .assign(Shape::Year(2001), 5.0)
            .unwrap();
        assert_eq!(map[&2001], 5.0);
        Addressable::YearMap(&mut map).assign(Shape::All, 0.5).unwrap();
        assert!(map.values().all(|v| *v == 0.5));
    }
}
