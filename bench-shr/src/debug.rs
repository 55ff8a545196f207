//  DEBUG.rs
//    by Lut99
//
//  Created:
//    06 Feb 2023, 10:12:31
//  Last edited:
//    21 Feb 2023, 14:40:02
//  Auto updated?
//    Yes
//
//  Description:
//!   Implements a few formatters used when reporting on executors,
//!   workloads and roles.
//

use std::cell::{RefCell, RefMut};
use std::fmt::{Debug, Display, Formatter, Result as FResult};


/***** TESTS *****/
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prettylist_connects_with_word() {
        assert_eq!(format!("{}", PrettyListFormatter::new([ "a" ].iter(), "or")), "a");
        assert_eq!(format!("{}", PrettyListFormatter::new([ "a", "b" ].iter(), "or")), "a or b");
        assert_eq!(format!("{}", PrettyListFormatter::new([ "a", "b", "c" ].iter(), "and")), "a, b and c");
    }

    #[test]
    fn block_keeps_only_tail() {
        let text: String = (0..10).map(|i| format!("line {}", i)).collect::<Vec<String>>().join("\n");
        let out: String = format!("{}", BlockFormatter::new(&text).with_max_lines(2));
        assert!(out.contains("(8 lines omitted)"));
        assert!(out.contains("line 8\nline 9"));
        assert!(!out.contains("line 7"));
    }

    #[test]
    fn block_marks_empty_output() {
        let out: String = format!("{}", BlockFormatter::new(""));
        assert!(out.contains("<no output>"));
    }
}





/***** LIBRARY *****/
/// Defines a struct that can format a (possibly huge) blob of process output neatly between two rulers.
///
/// Only the last `max_lines` lines are shown, since the tail of a workload's output is usually where the failure is.
pub struct BlockFormatter<S> {
    /// Reference to the thing to format.
    to_fmt    : S,
    /// The maximum number of lines to show, if any.
    max_lines : Option<usize>,
}
impl<S> BlockFormatter<S> {
    /// Constructor for the BlockFormatter.
    ///
    /// # Arguments
    /// - `to_fmt`: The thing to format.
    ///
    /// # Returns
    /// A new BlockFormatter instance that shows everything.
    #[inline]
    pub fn new(to_fmt: S) -> Self {
        Self {
            to_fmt,
            max_lines : None,
        }
    }

    /// Limits the formatter to only show the last `max_lines` lines.
    #[inline]
    pub fn with_max_lines(mut self, max_lines: usize) -> Self { self.max_lines = Some(max_lines); self }
}
impl<S> Display for BlockFormatter<S>
where
    S: AsRef<str>,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        let ruler: String = (0..80).map(|_| '-').collect();
        let text: &str = self.to_fmt.as_ref().trim_end();

        writeln!(f, "{}", ruler)?;
        if text.is_empty() {
            writeln!(f, "<no output>")?;
        } else {
            let lines: Vec<&str> = text.lines().collect();
            let skip: usize = match self.max_lines {
                Some(max) if lines.len() > max => {
                    writeln!(f, "({} lines omitted)", lines.len() - max)?;
                    lines.len() - max
                },
                _ => 0,
            };
            for line in &lines[skip..] {
                writeln!(f, "{}", line)?;
            }
        }
        writeln!(f, "{}", ruler)
    }
}



/// A helper struct that implements Display for a given iterator that prints it like a human-readable list.
pub struct PrettyListFormatter<'a, I> {
    /// The list to print.
    iter : RefCell<I>,
    /// The word to use as a connector word at the end.
    word : &'a str,
}
impl<'a, I> PrettyListFormatter<'a, I> {
    /// Constructor for the PrettyListFormatter.
    ///
    /// # Arguments
    /// - `iter`: The list to prettyprint.
    /// - `word`: The word to use at the end of the list (e.g., `and` or `or`).
    ///
    /// # Returns
    /// A new instance of the PrettyListFormatter that can be used to show the given iterator as a pretty list.
    #[inline]
    pub fn new(iter: I, word: &'a str) -> Self {
        Self {
            iter : RefCell::new(iter),
            word,
        }
    }
}
impl<'a, I> Display for PrettyListFormatter<'a, I>
where
    I: Iterator,
    <I as Iterator>::Item: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        let mut list: RefMut<I> = self.iter.borrow_mut();

        let mut first     : bool                          = true;
        let mut lookahead : Option<<I as Iterator>::Item> = list.next();
        while let Some(item) = lookahead.take() {
            lookahead = list.next();

            if first { first = false; }
            else if lookahead.is_some() { write!(f, ", ")?; }
            else { write!(f, " {} ", self.word)?; }

            write!(f, "{}", item)?;
        }

        Ok(())
    }
}



/// Defines a struct that implements a special type of Debug for the given EnumDebug-type.
pub struct EnumDebugFormatter<'a, T: ?Sized> {
    reference : &'a T,
}
impl<'a, T> Debug for EnumDebugFormatter<'a, T>
where
    T: EnumDebug,
{
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        write!(f, "{}::", std::any::type_name::<T>())?;
        self.reference.fmt_name(f)
    }
}
impl<'a, T> Display for EnumDebugFormatter<'a, T>
where
    T: EnumDebug,
{
    #[inline]
    fn fmt(&self, f: &mut Formatter<'_>) -> FResult {
        self.reference.fmt_name(f)
    }
}



/// Defines a really quick trait that allows printing only the name of the current variant of an enum (e.g., executor phases).
pub trait EnumDebug {
    /// Writes the name of this variant to the given formatter.
    ///
    /// # Arguments
    /// - `f`: The Formatter to write to.
    ///
    /// # Errors
    /// This function errors if it failed to write to the given formatter.
    fn fmt_name(&self, f: &mut Formatter<'_>) -> FResult;



    /// Function that returns a EnumDebugFormatter for the type implementing this.
    ///
    /// # Returns
    /// A new EnumDebugFormatter that implements Debug and Display.
    #[inline]
    fn variant(&self) -> EnumDebugFormatter<'_, Self> {
        EnumDebugFormatter {
            reference : self,
        }
    }
}
