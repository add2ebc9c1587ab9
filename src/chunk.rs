//! Pure-function text chunker (spec §4.3). No teacher equivalent exists --
//! the teacher never segments text -- so this is built directly from the
//! spec's boundary contract and tested against its worked examples (§8).

#[derive(Debug, Clone)]
pub struct PageText {
    pub page_number: u32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub page_number: u32,
    pub content: String,
}

pub struct Chunker {
    size: usize,
    overlap: usize,
}

impl Chunker {
    /// `overlap` must be smaller than `size`; this is enforced earlier by
    /// `Settings::from_env` validation, not re-checked per call.
    pub fn new(size: usize, overlap: usize) -> Self {
        Self { size, overlap }
    }

    /// Split a page-tagged text stream into overlapping chunks. Chunks never
    /// span pages; within a page the window advances by `size - overlap`
    /// until the tail (possibly shorter, emitted if non-empty). Character
    /// counts are Unicode scalar counts, not bytes.
    pub fn chunk(&self, pages: &[PageText]) -> Vec<TextChunk> {
        let stride = self.size - self.overlap;
        let mut out = Vec::new();

        for page in pages {
            let chars: Vec<char> = page.text.chars().collect();
            if chars.is_empty() {
                continue;
            }
            let mut start = 0usize;
            while start < chars.len() {
                let end = (start + self.size).min(chars.len());
                let slice: String = chars[start..end].iter().collect();
                if !slice.is_empty() {
                    out.push(TextChunk {
                        page_number: page.page_number,
                        content: slice,
                    });
                }
                if end == chars.len() {
                    break;
                }
                start += stride;
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(n: u32, len: usize) -> PageText {
        PageText {
            page_number: n,
            text: "a".repeat(len),
        }
    }

    #[test]
    fn single_page_2400_chars_yields_1000_1000_400() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk(&[page(1, 2400)]);
        let lens: Vec<usize> = chunks.iter().map(|c| c.content.chars().count()).collect();
        assert_eq!(lens, vec![1000, 1000, 400]);
        assert!(chunks.iter().all(|c| c.page_number == 1));
    }

    #[test]
    fn page_shorter_than_size_yields_one_chunk() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk(&[page(1, 500)]);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content.chars().count(), 500);
    }

    #[test]
    fn chunks_never_span_pages() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk(&[page(1, 1200), page(2, 100)]);
        assert!(chunks.iter().any(|c| c.page_number == 1));
        assert!(chunks.iter().any(|c| c.page_number == 2));
        // page 2's single chunk is not merged with page 1's tail
        let page2_chunks: Vec<_> = chunks.iter().filter(|c| c.page_number == 2).collect();
        assert_eq!(page2_chunks.len(), 1);
        assert_eq!(page2_chunks[0].content.chars().count(), 100);
    }

    #[test]
    fn empty_page_yields_no_chunks() {
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.chunk(&[page(1, 0)]);
        assert!(chunks.is_empty());
    }

    #[test]
    fn unicode_scalar_counts_not_bytes() {
        let chunker = Chunker::new(3, 1);
        // "é" is 2 bytes in utf-8 but 1 scalar; 4 scalars total
        let text = "éééé".to_string();
        let chunks = chunker.chunk(&[PageText {
            page_number: 1,
            text,
        }]);
        // stride = 2: [0..3) "ééé", [2..4) "éé"
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].content.chars().count(), 3);
        assert_eq!(chunks[1].content.chars().count(), 2);
    }
}
