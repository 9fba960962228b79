use crate::dictionary::pos::{POSTag, POSType};
use crate::dictionary::user::UserDictParam;
use crate::dictionary::Dictionary;
use crate::tokenizer::{DecompoundMode, Tokenizer};

const LEX_CSV: &str = "\
한국,0,0,500,*,NNP,*,*,*
은,0,0,500,*,J,*,*,*
대단,0,0,800,*,XR,*,*,*
한,0,0,800,Inflect,VA,E,*,하/VA+ㄴ/E
나라,0,0,500,*,NNG,*,*,*
입니다,0,0,800,Inflect,VCP,E,*,이/VCP+ㅂ니다/E
가락지나물,0,0,500,Compound,NNG,*,*,가락지/NNG+나물/NNG
년,0,0,500,*,NNB,*,*,*
백만,0,0,500,*,NR,*,*,*
金,0,0,500,*,NNG,*,김,*";

const MATRIX_DEF: &str = "1 1\n0 0 0";

const CHAR_DEF: &str = "\
DEFAULT 0 0
SPACE 0 1
NUMERIC 1 1
HANGUL 0 0
0x0020 SPACE
0x0030..0x0039 NUMERIC
0xAC00..0xD7A3 HANGUL";

const UNK_DEF: &str = "\
DEFAULT,0,0,3000,SY
NUMERIC,0,0,2000,SN
HANGUL,0,0,4000,UNKNOWN";

fn dictionary() -> Dictionary {
    Dictionary::from_readers(
        LEX_CSV.as_bytes(),
        MATRIX_DEF.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
    )
    .unwrap()
}

fn surfaces(worker: &crate::tokenizer::worker::Worker) -> Vec<String> {
    worker.token_iter().map(|t| t.surface().to_string()).collect()
}

#[test]
fn test_tokenize_sentence() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("한국은 대단한 나라입니다.").unwrap();
    worker.tokenize();

    assert_eq!(
        surfaces(&worker),
        ["한국", "은", "대단", "하", "ㄴ", "나라", "이", "ㅂ니다", "."]
    );

    // Content morphemes and their character offsets.
    let content: Vec<_> = worker
        .token_iter()
        .filter(|t| {
            matches!(
                t.left_pos(),
                POSTag::NNP | POSTag::XR | POSTag::NNG | POSTag::VCP
            )
        })
        .map(|t| (t.surface().to_string(), t.range_char()))
        .collect();
    assert_eq!(
        content,
        [
            ("한국".to_string(), 0..2),
            ("대단".to_string(), 4..6),
            ("나라".to_string(), 8..10),
            ("이".to_string(), 10..13),
        ]
    );

    //   [BOS] 한국 은 대단 (하 ㄴ) 나라 (이 ㅂ니다) . [EOS]
    //    500 + 500 + 800 + 800 + 500 + 800 + 3000, all connections 0
    assert_eq!(worker.token(0).total_cost(), 500);
    assert_eq!(worker.token(8).total_cost(), 6900);
}

#[test]
fn test_spaces_not_tokens() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("한국 나라").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["한국", "나라"]);
    assert_eq!(worker.token(0).range_char(), 0..2);
    assert_eq!(worker.token(1).range_char(), 3..5);
    assert_eq!(worker.token(1).range_byte(), 7..13);
}

#[test]
fn test_unknown_grouping_on() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("2018년").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["2018", "년"]);
    assert_eq!(worker.token(0).left_pos(), POSTag::SN);
    assert_eq!(worker.token(0).range_char(), 0..4);
}

#[test]
fn test_unknown_grouping_off() {
    let tokenizer = Tokenizer::new(dictionary()).group_unknowns(false);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("2018년").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["2", "0", "1", "8", "년"]);
}

#[test]
fn test_decompound_discard() {
    let tokenizer = Tokenizer::new(dictionary()).decompound_mode(DecompoundMode::Discard);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("가락지나물은").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["가락지", "나물", "은"]);
    assert_eq!(worker.token(0).range_char(), 0..3);
    assert_eq!(worker.token(1).range_char(), 3..5);
    assert_eq!(worker.token(2).range_char(), 5..6);
    assert_eq!(worker.token(0).pos_type(), POSType::Morpheme);
}

#[test]
fn test_decompound_none() {
    let tokenizer = Tokenizer::new(dictionary()).decompound_mode(DecompoundMode::None);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("가락지나물은").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["가락지나물", "은"]);
    assert_eq!(worker.token(0).pos_type(), POSType::Compound);
    assert_eq!(worker.token(0).position_length(), 1);
}

#[test]
fn test_decompound_mixed() {
    let tokenizer = Tokenizer::new(dictionary()).decompound_mode(DecompoundMode::Mixed);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("가락지나물은").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["가락지나물", "가락지", "나물", "은"]);
    // The whole compound spans the positions of its parts.
    assert_eq!(worker.token(0).position_length(), 2);
    assert_eq!(worker.token(0).range_char(), 0..5);
    assert_eq!(worker.token(1).range_char(), 0..3);
    assert_eq!(worker.token(1).position_length(), 1);
}

#[test]
fn test_hyphen_is_a_symbol_token() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("-백만").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["-", "백만"]);
    assert_eq!(worker.token(0).left_pos(), POSTag::SY);
    assert_eq!(worker.token(1).left_pos(), POSTag::NR);
}

#[test]
fn test_reading() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("金").unwrap();
    worker.tokenize();

    assert_eq!(worker.num_tokens(), 1);
    assert_eq!(worker.token(0).surface(), "金");
    assert_eq!(worker.token(0).reading(), Some("김"));

    worker.reset_sentence("나라").unwrap();
    worker.tokenize();
    assert_eq!(worker.token(0).reading(), None);
}

#[test]
fn test_user_dictionary_segmentation() {
    let param = UserDictParam {
        left_id: 0,
        right_id: 0,
        right_id_coda: 0,
        right_id_nocoda: 0,
        word_cost: -1000,
    };
    let dict = dictionary()
        .user_dictionary_from_reader("세종시 세종 시".as_bytes(), param)
        .unwrap();
    let tokenizer = Tokenizer::new(dict).decompound_mode(DecompoundMode::Discard);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("세종시").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["세종", "시"]);
    assert_eq!(worker.token(0).left_pos(), POSTag::NNG);
    assert_eq!(worker.token(0).range_char(), 0..2);
    assert_eq!(worker.token(1).range_char(), 2..3);
}

#[test]
fn test_user_dictionary_whole_entry() {
    let param = UserDictParam {
        left_id: 0,
        right_id: 0,
        right_id_coda: 0,
        right_id_nocoda: 0,
        word_cost: -1000,
    };
    let dict = dictionary()
        .user_dictionary_from_reader("세종시 세종 시".as_bytes(), param)
        .unwrap();
    let tokenizer = Tokenizer::new(dict).decompound_mode(DecompoundMode::None);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("세종시").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["세종시"]);
    assert_eq!(worker.token(0).pos_type(), POSType::Compound);
}

#[test]
fn test_user_dictionary_cost_beats_lexicon() {
    // The default user cost of -100000 is far below the i16 range of
    // lexicon costs and must survive the trip through the lattice.
    let param = UserDictParam {
        left_id: 0,
        right_id: 0,
        right_id_coda: 0,
        right_id_nocoda: 0,
        ..UserDictParam::default()
    };
    let dict = dictionary()
        .user_dictionary_from_reader("한국".as_bytes(), param)
        .unwrap();
    let tokenizer = Tokenizer::new(dict);
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("한국").unwrap();
    worker.tokenize();

    assert_eq!(surfaces(&worker), ["한국"]);
    assert_eq!(worker.token(0).total_cost(), -100000);
}

#[test]
fn test_idempotent() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();

    worker.reset_sentence("한국은 대단한 나라입니다.").unwrap();
    worker.tokenize();
    let first: Vec<_> = worker
        .token_iter()
        .map(|t| (t.surface().to_string(), t.range_char(), t.total_cost()))
        .collect();

    worker.reset_sentence("한국은 대단한 나라입니다.").unwrap();
    worker.tokenize();
    let second: Vec<_> = worker
        .token_iter()
        .map(|t| (t.surface().to_string(), t.range_char(), t.total_cost()))
        .collect();

    assert_eq!(first, second);
}

#[test]
fn test_tokenize_empty() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("").unwrap();
    worker.tokenize();
    assert_eq!(worker.num_tokens(), 0);
}

#[test]
fn test_tokenize_only_spaces() {
    let tokenizer = Tokenizer::new(dictionary());
    let mut worker = tokenizer.new_worker();
    worker.reset_sentence("   ").unwrap();
    worker.tokenize();
    assert_eq!(worker.num_tokens(), 0);
}
