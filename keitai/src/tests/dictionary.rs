use crate::dictionary::{Dictionary, WordParam};
use crate::errors::KeitaiError;
use crate::utils;

const LEX_CSV: &str = "東京,1,2,100,名詞,固有名詞,トウキョウ
東,3,3,150,名詞,一般,ヒガシ
京,3,3,150,名詞,一般,キョウ
東京都,1,2,120,名詞,固有名詞,トウキョウト
\"1,2\",0,0,50,記号,\"一,二\"
都,2,1,-30,接尾辞,地名,ト
東京,3,1,90,名詞,一般,ヒガシキョウ";

const MATRIX_DEF: &str = "4 4
0 0 0
0 1 -10
0 2 5
0 3 7
1 0 3
1 1 -4
1 2 2
1 3 0
2 0 -8
2 1 6
2 2 1
2 3 9
3 0 0
3 1 0
3 2 0
3 3 -2";

const CHAR_DEF: &str = "DEFAULT 0 1 0
KANJI 0 0 2
NUMERIC 1 1 0
0x0030..0x0039 NUMERIC
0x4E00..0x9FFF KANJI";

const UNK_DEF: &str = "DEFAULT,0,0,1000,記号,*
KANJI,3,3,800,名詞,*
KANJI,1,1,900,名詞,固有名詞
NUMERIC,0,0,500,名詞,数";

fn compile() -> Dictionary {
    Dictionary::from_readers(
        LEX_CSV.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
    )
    .unwrap()
}

fn find_entry(dict: &Dictionary, surface: &str, feature: &str) -> Option<WordParam> {
    let chars: Vec<_> = surface.chars().collect();
    dict.system_lexicon()
        .lookup(&chars, 0)
        .into_iter()
        .filter(|m| m.end_char() == chars.len())
        .find(|m| dict.word_feature(m.word_idx()) == feature)
        .map(|m| dict.word_param(m.word_idx()))
}

#[test]
fn test_compile_write_read() {
    let dict = compile();
    let mut buf = vec![];
    dict.write(&mut buf).unwrap();
    let dict = Dictionary::read(buf.as_slice()).unwrap();

    assert_eq!(7, dict.system_lexicon().len());
    for line in LEX_CSV.lines() {
        let cells = utils::parse_csv_row(line);
        let feature = cells[4..].join(",");
        let param = WordParam::new(
            cells[1].parse().unwrap(),
            cells[2].parse().unwrap(),
            cells[3].parse().unwrap(),
        );
        assert_eq!(Some(param), find_entry(&dict, &cells[0], &feature), "{line}");
    }

    for line in MATRIX_DEF.lines().skip(1) {
        let cols: Vec<i32> = line.split(' ').map(|c| c.parse().unwrap()).collect();
        let (right_id, left_id) = (u16::try_from(cols[0]).unwrap(), u16::try_from(cols[1]).unwrap());
        assert_eq!(cols[2], dict.connector().cost(right_id, left_id));
    }

    let mut unk_entries: Vec<_> = dict
        .unk_handler()
        .entries()
        .map(|e| (e.param, e.feature.clone()))
        .collect();
    unk_entries.sort_unstable_by_key(|(p, _)| p.word_cost);
    assert_eq!(
        vec![
            (WordParam::new(0, 0, 500), "名詞,数".to_string()),
            (WordParam::new(3, 3, 800), "名詞,*".to_string()),
            (WordParam::new(1, 1, 900), "名詞,固有名詞".to_string()),
            (WordParam::new(0, 0, 1000), "記号,*".to_string()),
        ],
        unk_entries
    );
}

#[test]
fn test_write_to_path_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("system.dic");
    let dict = compile();
    dict.write_to_path(&path).unwrap();

    let dict = Dictionary::read(std::fs::File::open(&path).unwrap()).unwrap();
    assert_eq!(
        Some(WordParam::new(2, 1, -30)),
        find_entry(&dict, "都", "接尾辞,地名,ト")
    );
}

#[test]
fn test_malformed_entry() {
    let lex_csv = "東京,1,2,100,名詞\n東,3,3,abc,名詞";
    let result = Dictionary::from_readers(
        lex_csv.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
    );
    assert!(matches!(result, Err(KeitaiError::MalformedEntry { line: 2, .. })));

    let lex_csv = "東京,1,2";
    let result = Dictionary::from_readers(
        lex_csv.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
    );
    assert!(matches!(result, Err(KeitaiError::MalformedEntry { line: 1, .. })));
}

#[test]
fn test_undefined_context_id() {
    let lex_csv = "東京,1,2,100,名詞\n\n東,4,0,150,名詞";
    let result = Dictionary::from_readers(
        lex_csv.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
    );
    assert!(matches!(result, Err(KeitaiError::MalformedEntry { line: 3, .. })));

    let unk_def = "DEFAULT,0,0,1000,記号\nKANJI,0,9,800,名詞\nNUMERIC,0,0,500,名詞";
    let result = Dictionary::from_readers(
        LEX_CSV.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        unk_def.as_bytes(),
    );
    assert!(matches!(result, Err(KeitaiError::MalformedEntry { line: 2, .. })));
}

#[test]
fn test_malformed_matrix() {
    for (matrix_def, line) in [
        ("2 2\n0 0 0\n0 1", 3),
        ("2 2\n0 0 0\n2 0 1", 3),
        ("2 2\n0 0 x", 2),
        ("2", 1),
        ("", 1),
    ] {
        let result = Dictionary::from_readers(
            "東京,0,0,100,名詞".as_bytes(),
            matrix_def.as_bytes(),
            "DEFAULT 0 1 0".as_bytes(),
            "DEFAULT,0,0,1000,記号".as_bytes(),
        );
        assert!(
            matches!(result, Err(KeitaiError::MalformedMatrix { line: l, .. }) if l == line),
            "{matrix_def:?}"
        );
    }
}

#[test]
fn test_undefined_category() {
    let result = Dictionary::from_readers(
        "東京,0,0,100,名詞".as_bytes(),
        "1 1\n0 0 0".as_bytes(),
        "DEFAULT 0 1 0".as_bytes(),
        "DEFAULT,0,0,1000,記号\nALPHA,0,0,1000,記号".as_bytes(),
    );
    assert!(matches!(result, Err(KeitaiError::InvalidFormat(_))));
}
