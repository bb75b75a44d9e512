use crate::errors::KeitaiError;
use crate::trainer::{Corpus, Model, Regularization, Trainer, TrainerConfig};
use crate::Tokenizer;

const LEX_CSV: &str = "東,0,0,0,名詞,ヒガシ
京,0,0,0,名詞,キョウ
東京,0,0,0,名詞,トウキョウ
京都,0,0,0,名詞,キョウト
都,0,0,0,接尾辞,ト
に,0,0,0,助詞,ニ
へ,0,0,0,助詞,ヘ
行く,0,0,0,動詞,イク
来る,0,0,0,動詞,クル
大阪,0,0,0,名詞,オオサカ";

const CHAR_DEF: &str = "DEFAULT 0 1 0
HIRAGANA 0 1 0
KATAKANA 1 1 0
0x3041..0x309F HIRAGANA
0x30A1..0x30FF KATAKANA";

const UNK_DEF: &str = "DEFAULT,0,0,0,名詞,*
HIRAGANA,0,0,0,助詞,*
KATAKANA,0,0,0,名詞,*";

const FEATURE_DEF: &str = "UNIGRAM word:%F[0],%F[1]
UNIGRAM pos:%F[0]
UNIGRAM type:%t
BIGRAM pos:%L[0]/pos:%R[0]
BIGRAM word:%L[0],%L[1]/pos:%R[0]";

const REWRITE_DEF: &str = "[unigram rewrite]
*,*\t$1,$2

[left rewrite]
*,*\t$1,$2

[right rewrite]
*,*\t$1,$2";

const CORPUS: &str = "東京\t名詞,トウキョウ
都\t接尾辞,ト
に\t助詞,ニ
行く\t動詞,イク
EOS
京都\t名詞,キョウト
へ\t助詞,ヘ
来る\t動詞,クル
EOS
大阪\t名詞,オオサカ
に\t助詞,ニ
行く\t動詞,イク
EOS
東\t名詞,ヒガシ
へ\t助詞,ヘ
行く\t動詞,イク
EOS
パリ\t名詞,パリ
へ\t助詞,ヘ
行く\t動詞,イク
EOS
";

const HOMOGRAPH_LEX_CSV: &str = "木,0,0,0,名詞,キ
犬,0,0,0,名詞,イヌ
の,0,0,0,助詞,ノ
は,0,0,0,名詞,ハ
は,0,0,0,助詞,ワ
が,0,0,0,助詞,ガ
赤い,0,0,0,形容詞,アカイ
走る,0,0,0,動詞,ハシル
落ちる,0,0,0,動詞,オチル";

// `は` is a noun after `の` and a particle after a noun.
const HOMOGRAPH_CORPUS: &str = "木\t名詞,キ
の\t助詞,ノ
は\t名詞,ハ
は\t助詞,ワ
赤い\t形容詞,アカイ
EOS
犬\t名詞,イヌ
は\t助詞,ワ
走る\t動詞,ハシル
EOS
木\t名詞,キ
の\t助詞,ノ
は\t名詞,ハ
が\t助詞,ガ
落ちる\t動詞,オチル
EOS
犬\t名詞,イヌ
の\t助詞,ノ
は\t名詞,ハ
は\t助詞,ワ
赤い\t形容詞,アカイ
EOS
";

fn config_with_lexicon(lexicon: &str) -> TrainerConfig {
    TrainerConfig::from_readers(
        lexicon.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
        FEATURE_DEF.as_bytes(),
        REWRITE_DEF.as_bytes(),
    )
    .unwrap()
}

fn config() -> TrainerConfig {
    config_with_lexicon(LEX_CSV)
}

fn train_with(config: TrainerConfig, corpus: &str, num_threads: usize, max_iter: u64) -> Model {
    let corpus = Corpus::from_reader(corpus.as_bytes()).unwrap();
    Trainer::new(config)
        .unwrap()
        .regularization(Regularization::L1, 0.01)
        .num_threads(num_threads)
        .max_iter(max_iter)
        .train(corpus)
        .unwrap()
}

fn train(corpus: &str, num_threads: usize, max_iter: u64) -> Model {
    train_with(config(), corpus, num_threads, max_iter)
}

fn assert_reproduces(model: &Model, corpus: &str) {
    let tokenizer = Tokenizer::new(model.build_dictionary().unwrap());
    let mut worker = tokenizer.new_worker();

    let corpus = Corpus::from_reader(corpus.as_bytes()).unwrap();
    for example in corpus.examples() {
        worker.reset_sentence(example.sentence());
        worker.tokenize().unwrap();
        let expected: Vec<_> = example
            .tokens()
            .iter()
            .map(|w| (w.surface().to_string(), w.feature().to_string()))
            .collect();
        let actual: Vec<_> = worker
            .token_iter()
            .map(|t| (t.surface().to_string(), t.feature().to_string()))
            .collect();
        assert_eq!(expected, actual);
    }
}

#[test]
fn test_reproduce_training_corpus() {
    let model = train(CORPUS, 1, 300);
    assert_reproduces(&model, CORPUS);
}

#[test]
fn test_reproduce_homograph_tags() {
    let model = train_with(config_with_lexicon(HOMOGRAPH_LEX_CSV), HOMOGRAPH_CORPUS, 1, 300);
    assert_reproduces(&model, HOMOGRAPH_CORPUS);
}

#[test]
fn test_written_dictionary_equals_built_one() {
    let model = train(CORPUS, 1, 30);

    let mut lex = vec![];
    let mut matrix = vec![];
    let mut unk = vec![];
    model.write_dictionary(&mut lex, &mut matrix, &mut unk).unwrap();
    let written = crate::Dictionary::from_readers(
        &*lex,
        &*matrix,
        CHAR_DEF.as_bytes(),
        &*unk,
    )
    .unwrap();
    let built = model.build_dictionary().unwrap();

    let written = Tokenizer::new(written);
    let built = Tokenizer::new(built);
    let mut w1 = written.new_worker();
    let mut w2 = built.new_worker();
    for sentence in ["東京都に行く", "京都へ来る", "パリに行く", "ロンドンへ来る", ""] {
        w1.reset_sentence(sentence);
        w1.tokenize().unwrap();
        w2.reset_sentence(sentence);
        w2.tokenize().unwrap();
        let t1: Vec<_> = w1
            .token_iter()
            .map(|t| (t.surface(), t.feature(), t.total_cost()))
            .collect();
        let t2: Vec<_> = w2
            .token_iter()
            .map(|t| (t.surface(), t.feature(), t.total_cost()))
            .collect();
        assert_eq!(t1, t2);
    }
}

#[test]
fn test_reproducible_across_threads() {
    // More sentences than a block of gradient accumulation.
    let corpus = CORPUS.repeat(8);
    let mut models = vec![];
    for num_threads in [1, 3] {
        let model = train(&corpus, num_threads, 10);
        let mut data = vec![];
        model.write(&mut data).unwrap();
        models.push(data);
    }
    assert_eq!(models[0], models[1]);
}

#[test]
fn test_reproducible_dictionary() {
    let mut outputs = vec![];
    for _ in 0..2 {
        let model = train(CORPUS, 2, 10);
        let mut lex = vec![];
        let mut matrix = vec![];
        let mut unk = vec![];
        model.write_dictionary(&mut lex, &mut matrix, &mut unk).unwrap();
        outputs.push((lex, matrix, unk));
    }
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_stop_before_training() {
    let corpus = Corpus::from_reader(CORPUS.as_bytes()).unwrap();
    let trainer = Trainer::new(config()).unwrap();
    trainer.stop_handle().stop();
    let model = trainer.train(corpus).unwrap();
    assert_eq!(0, model.num_active_weights());
}

#[test]
fn test_l1_is_sparser_than_l2() {
    let corpus = Corpus::from_reader(CORPUS.as_bytes()).unwrap();
    let l1 = Trainer::new(config())
        .unwrap()
        .regularization(Regularization::L1, 0.5)
        .max_iter(100)
        .train(corpus)
        .unwrap();
    let corpus = Corpus::from_reader(CORPUS.as_bytes()).unwrap();
    let l2 = Trainer::new(config())
        .unwrap()
        .regularization(Regularization::L2, 0.5)
        .max_iter(100)
        .train(corpus)
        .unwrap();
    assert!(l1.num_active_weights() < l2.num_active_weights());
}

#[test]
fn test_empty_corpus() {
    let corpus = Corpus::from_reader("".as_bytes()).unwrap();
    let result = Trainer::new(config()).unwrap().train(corpus);
    assert!(matches!(result, Err(KeitaiError::EmptyCorpus)));
}

#[test]
fn test_invalid_feature_definition() {
    let result = TrainerConfig::from_readers(
        LEX_CSV.as_bytes(),
        CHAR_DEF.as_bytes(),
        UNK_DEF.as_bytes(),
        "TRIGRAM %F[0]".as_bytes(),
        REWRITE_DEF.as_bytes(),
    );
    assert!(result.is_err());
}
