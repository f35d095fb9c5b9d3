//! Mermaid state-diagram rendering.
//!
//! Output depends only on the definition, the marking and the initial
//! place, and is emitted in declaration order so it is byte-stable:
//!
//! ```text
//! stateDiagram-v2
//!     classDef currentPlace font-weight:bold,stroke-width:4px
//!     start
//!     end
//!     start --> end : finish
//!
//!     %% Current places
//!     class start currentPlace
//!
//!     %% Initial place
//!     [*] --> start
//! ```
//!
//! A transition with several targets goes through a `<name>_fork` node, one
//! with several sources through a `<name>_join` node.

use crate::definition::Definition;
use crate::marking::Marking;
use crate::place::Place;
use crate::transition::Transition;
use std::fmt;

const INDENT: &str = "    ";

/// Renders a definition and marking.
#[derive(Debug, Clone, Copy)]
pub struct Diagram<'a> {
    definition: &'a Definition,
    marking: &'a Marking,
    initial: &'a Place,
}

impl<'a> Diagram<'a> {
    pub fn new(definition: &'a Definition, marking: &'a Marking, initial: &'a Place) -> Self {
        Self {
            definition,
            marking,
            initial,
        }
    }

    fn write_transition(&self, f: &mut fmt::Formatter<'_>, t: &Transition) -> fmt::Result {
        let name = t.name();
        let (from, to) = (t.from(), t.to());

        if to.len() > 1 {
            let fork = format!("{}_fork", name);
            writeln!(f, "{INDENT}state {} <<fork>>", fork)?;
            if from.len() > 1 {
                let join = self.write_join(f, t)?;
                writeln!(f, "{INDENT}{} --> {}", join, fork)?;
            } else {
                writeln!(f, "{INDENT}{} --> {} : {}", from[0], fork, name)?;
            }
            for place in to {
                writeln!(f, "{INDENT}{} --> {}", fork, place)?;
            }
        } else if from.len() > 1 {
            let join = self.write_join(f, t)?;
            writeln!(f, "{INDENT}{} --> {}", join, to[0])?;
        } else {
            writeln!(f, "{INDENT}{} --> {} : {}", from[0], to[0], name)?;
        }
        Ok(())
    }

    /// Writes the join node and its incoming edges; returns the node name.
    fn write_join(&self, f: &mut fmt::Formatter<'_>, t: &Transition) -> Result<String, fmt::Error> {
        let join = format!("{}_join", t.name());
        writeln!(f, "{INDENT}state {} <<join>>", join)?;
        for place in t.from() {
            writeln!(f, "{INDENT}{} --> {} : {}", place, join, t.name())?;
        }
        Ok(join)
    }
}

impl fmt::Display for Diagram<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "stateDiagram-v2")?;
        writeln!(f, "{INDENT}classDef currentPlace font-weight:bold,stroke-width:4px")?;

        for place in self.definition.places() {
            writeln!(f, "{INDENT}{}", place)?;
        }

        for t in self.definition.transitions() {
            self.write_transition(f, t)?;
        }

        if !self.marking.is_empty() {
            writeln!(f)?;
            writeln!(f, "{INDENT}%% Current places")?;
            for place in self.marking.as_slice() {
                writeln!(f, "{INDENT}class {} currentPlace", place)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "{INDENT}%% Initial place")?;
        writeln!(f, "{INDENT}[*] --> {}", self.initial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::place::places;
    use crate::workflow::Workflow;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn render(def: Definition, initial: &str) -> String {
        Workflow::new("test", Arc::new(def), initial).unwrap().diagram()
    }

    #[test]
    fn test_simple_diagram() {
        let def = Definition::must(
            places(["start", "end"]),
            vec![Transition::must("to-end", places(["start"]), places(["end"]))],
        );

        let expected = "stateDiagram-v2
    classDef currentPlace font-weight:bold,stroke-width:4px
    start
    end
    start --> end : to-end

    %% Current places
    class start currentPlace

    %% Initial place
    [*] --> start
";
        assert_eq!(render(def, "start"), expected);
    }

    #[test]
    fn test_fork_and_join_diagram() {
        let def = Definition::must(
            places(["start", "branch1", "branch2", "end"]),
            vec![
                Transition::must("fork", places(["start"]), places(["branch1", "branch2"])),
                Transition::must("merge", places(["branch1", "branch2"]), places(["end"])),
            ],
        );

        let expected = "stateDiagram-v2
    classDef currentPlace font-weight:bold,stroke-width:4px
    start
    branch1
    branch2
    end
    state fork_fork <<fork>>
    start --> fork_fork : fork
    fork_fork --> branch1
    fork_fork --> branch2
    state merge_join <<join>>
    branch1 --> merge_join : merge
    branch2 --> merge_join : merge
    merge_join --> end

    %% Current places
    class start currentPlace

    %% Initial place
    [*] --> start
";
        assert_eq!(render(def, "start"), expected);
    }

    #[test]
    fn test_join_into_fork() {
        let def = Definition::must(
            places(["a", "b", "c", "d"]),
            vec![Transition::must("swap", places(["a", "b"]), places(["c", "d"]))],
        );

        let expected = "stateDiagram-v2
    classDef currentPlace font-weight:bold,stroke-width:4px
    a
    b
    c
    d
    state swap_fork <<fork>>
    state swap_join <<join>>
    a --> swap_join : swap
    b --> swap_join : swap
    swap_join --> swap_fork
    swap_fork --> c
    swap_fork --> d

    %% Current places
    class a currentPlace

    %% Initial place
    [*] --> a
";
        assert_eq!(render(def, "a"), expected);
    }

    #[test]
    fn test_current_places_follow_marking() {
        let def = Definition::must(
            places(["start", "branch1", "branch2"]),
            vec![Transition::must("fork", places(["start"]), places(["branch1", "branch2"]))],
        );
        let mut wf = Workflow::new("wf", Arc::new(def), "start").unwrap();
        wf.apply(&places(["branch1", "branch2"])).unwrap();

        let diagram = wf.diagram();
        assert!(diagram.contains("    class branch1 currentPlace\n    class branch2 currentPlace\n"));
        assert!(!diagram.contains("class start currentPlace"));
        assert!(diagram.ends_with("    [*] --> start\n"));
    }

    #[test]
    fn test_empty_marking_skips_current_block() {
        let def = Definition::must(places(["start"]), vec![]);
        let marking = Marking::default();
        let initial = Place::from("start");
        let text = Diagram::new(&def, &marking, &initial).to_string();
        assert!(!text.contains("%% Current places"));
    }

    proptest! {
        #[test]
        fn prop_rendering_is_deterministic(
            marked in proptest::collection::vec(0usize..4, 1..4),
        ) {
            let names = ["p0", "p1", "p2", "p3"];
            let def = Definition::must(
                places(names),
                vec![
                    Transition::must("split", places(["p0"]), places(["p1", "p2"])),
                    Transition::must("merge", places(["p1", "p2"]), places(["p3"])),
                ],
            );
            let marking = Marking::new(&places(marked.iter().map(|i| names[*i])));
            let initial = Place::from("p0");

            let first = Diagram::new(&def, &marking, &initial).to_string();
            let second = Diagram::new(&def, &marking, &initial).to_string();
            prop_assert_eq!(first, second);
        }
    }
}
