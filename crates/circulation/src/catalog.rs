//! Catalog: book descriptors plus the per-book availability counter.
//!
//! The catalog is the only writer of `available_copies`; the engine asks it to
//! decrement on borrow and increment on return, and the catalog refuses any
//! change that would break `0 <= available <= total`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use libcirc_core::{BookId, CirculationError, CirculationResult, Entity, ValueObject};

/// Subject category used for browsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Fiction,
    #[serde(rename = "Non-Fiction")]
    NonFiction,
    Science,
    Technology,
    History,
    Comics,
    Philosophy,
    Other,
}

impl ValueObject for Category {}

impl core::fmt::Display for Category {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Category::Fiction => "Fiction",
            Category::NonFiction => "Non-Fiction",
            Category::Science => "Science",
            Category::Technology => "Technology",
            Category::History => "History",
            Category::Comics => "Comics",
            Category::Philosophy => "Philosophy",
            Category::Other => "Other",
        };
        f.write_str(name)
    }
}

/// A catalog entry.
///
/// Descriptive fields are public; the copy counters are only readable, so the
/// conservation invariant cannot be broken from outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub is_free: bool,
    /// Reference to readable content (e.g. a PDF) for free books.
    #[serde(default)]
    pub content_url: Option<String>,
    total_copies: u32,
    available_copies: u32,
}

impl Book {
    /// A new book with every copy on the shelf.
    pub fn new(
        id: BookId,
        title: impl Into<String>,
        author: impl Into<String>,
        total_copies: u32,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            author: author.into(),
            description: String::new(),
            categories: Vec::new(),
            cover_url: None,
            is_free: false,
            content_url: None,
            total_copies,
            available_copies: total_copies,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_cover(mut self, url: impl Into<String>) -> Self {
        self.cover_url = Some(url.into());
        self
    }

    /// Mark the book free to read online at `url`.
    pub fn free_with_content(mut self, url: impl Into<String>) -> Self {
        self.is_free = true;
        self.content_url = Some(url.into());
        self
    }

    /// Override the shelf count (seed data describing books already out).
    ///
    /// The value is validated when the book enters a [`Catalog`].
    pub fn with_available_copies(mut self, available: u32) -> Self {
        self.available_copies = available;
        self
    }

    pub fn total_copies(&self) -> u32 {
        self.total_copies
    }

    pub fn available_copies(&self) -> u32 {
        self.available_copies
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    /// Free books with attached content can be read without borrowing.
    pub fn is_readable(&self) -> bool {
        self.is_free && self.content_url.is_some()
    }

    fn check_bounds(&self) -> CirculationResult<()> {
        if self.available_copies > self.total_copies {
            return Err(CirculationError::invariant(format!(
                "book {} has {} available of {} total copies",
                self.id, self.available_copies, self.total_copies
            )));
        }
        Ok(())
    }
}

impl Entity for Book {
    type Id = BookId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Books in seed order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    books: Vec<Book>,
    index: HashMap<BookId, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from seed records.
    ///
    /// Rejects duplicate ids and books whose counters are out of bounds.
    pub fn from_seed(books: impl IntoIterator<Item = Book>) -> CirculationResult<Self> {
        let mut catalog = Self::new();
        for book in books {
            catalog.insert(book)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, book: Book) -> CirculationResult<()> {
        book.check_bounds()?;
        if self.index.contains_key(&book.id) {
            return Err(CirculationError::invariant(format!(
                "duplicate book id {}",
                book.id
            )));
        }
        self.index.insert(book.id, self.books.len());
        self.books.push(book);
        Ok(())
    }

    pub fn find_book(&self, id: BookId) -> Option<&Book> {
        self.index.get(&id).map(|&i| &self.books[i])
    }

    pub fn contains(&self, id: BookId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Take one copy off the shelf.
    pub(crate) fn decrement_availability(&mut self, id: BookId) -> CirculationResult<()> {
        let book = self.find_book_mut(id)?;
        if book.available_copies == 0 {
            return Err(CirculationError::invariant(format!(
                "book {id} has no copies left to take"
            )));
        }
        book.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back on the shelf.
    pub(crate) fn increment_availability(&mut self, id: BookId) -> CirculationResult<()> {
        let book = self.find_book_mut(id)?;
        if book.available_copies >= book.total_copies {
            return Err(CirculationError::invariant(format!(
                "book {id} already has all {} copies on the shelf",
                book.total_copies
            )));
        }
        book.available_copies += 1;
        Ok(())
    }

    fn find_book_mut(&mut self, id: BookId) -> CirculationResult<&mut Book> {
        match self.index.get(&id) {
            Some(&i) => Ok(&mut self.books[i]),
            None => Err(CirculationError::BookNotFound),
        }
    }
}
