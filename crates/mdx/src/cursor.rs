//! Bounded read cursor over a track's bytecode

// SPDX-FileCopyrightText: © 2023 Marcus Rowe <undisbeliever@gmail.com>
//
// SPDX-License-Identifier: MIT

// position MUST always be <= data.len()
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(data: &'a [u8], position: usize) -> Self {
        Self {
            data,
            position: position.min(data.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_at_end(&self) -> bool {
        self.position >= self.data.len()
    }

    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn advance(&mut self, n_bytes: usize) {
        self.position = self.position.saturating_add(n_bytes).min(self.data.len());
    }

    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    pub fn seek_to_end(&mut self) {
        self.position = self.data.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_never_passes_end() {
        let data = [1, 2, 3];

        let mut c = ByteCursor::new(&data, 10);
        assert_eq!(c.position(), 3);
        assert!(c.is_at_end());

        c.seek(1);
        assert_eq!(c.remaining_bytes(), &[2, 3]);

        c.advance(usize::MAX);
        assert_eq!(c.position(), 3);
        assert!(c.remaining_bytes().is_empty());
    }
}
