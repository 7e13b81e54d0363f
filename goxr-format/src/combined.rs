use std::collections::HashSet;

use crate::entry::FileInfo;
use crate::error::{Error, Result};
use crate::open::{BoxFile, Predicate, ReadBox};

/// Several boxes behind one read contract. Lookups go through the members in
/// order and the first one that has the file wins.
#[derive(Default)]
pub struct CombinedBox {
    boxes: Vec<Box<dyn ReadBox>>,
}

impl CombinedBox {
    pub fn new() -> Self {
        CombinedBox::default()
    }

    pub fn push<B: ReadBox + 'static>(&mut self, member: B) {
        self.boxes.push(Box::new(member));
    }

    pub fn with<B: ReadBox + 'static>(mut self, member: B) -> Self {
        self.push(member);
        self
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn first<T, F>(&self, op: &'static str, name: &str, mut f: F) -> Result<T>
    where
        F: FnMut(&dyn ReadBox) -> Result<T>,
    {
        for member in &self.boxes {
            match f(member.as_ref()) {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(Error::NotFound.at(op, name))
    }
}

impl From<Vec<Box<dyn ReadBox>>> for CombinedBox {
    fn from(boxes: Vec<Box<dyn ReadBox>>) -> Self {
        CombinedBox { boxes }
    }
}

impl ReadBox for CombinedBox {
    fn open(&self, name: &str) -> Result<BoxFile> {
        self.first("open", name, |member| member.open(name))
    }

    fn info(&self, name: &str) -> Result<FileInfo> {
        self.first("info", name, |member| member.info(name))
    }

    /// Reports each path once, as served by the first member that has it.
    fn for_each(
        &self,
        predicate: Option<&Predicate<'_>>,
        callback: &mut dyn FnMut(&FileInfo) -> Result<()>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        for member in &self.boxes {
            member.for_each(predicate, &mut |info| {
                if seen.insert(info.path.clone()) {
                    callback(info)
                } else {
                    Ok(())
                }
            })?;
        }
        Ok(())
    }

    /// Closes every member, even after failures, and reports all failures together.
    fn close(&mut self) -> Result<()> {
        let errors: Vec<Error> = self
            .boxes
            .iter_mut()
            .filter_map(|member| member.close().err())
            .collect();

        match Error::combine(errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
