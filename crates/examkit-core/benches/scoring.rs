use criterion::{black_box, criterion_group, criterion_main, Criterion};

use examkit_core::model::{Difficulty, QuestionId, QuestionOutcome, ResultSummary, TestResult};
use examkit_core::statistics::{analyze, difficulty_breakdown, Grade};

fn make_result(total: u32) -> TestResult {
    let per_question: Vec<QuestionOutcome> = (0..total)
        .map(|i| QuestionOutcome {
            question_id: QuestionId::new(format!("q{i}")),
            selected_option_index: if i % 7 == 0 { -1 } else { (i % 4) as i32 },
            correct_option_index: (i % 4) as i32,
            is_correct: i % 7 != 0 && i % 3 != 0,
            difficulty: Difficulty::ALL[(i % 3) as usize],
            explanation: Some(format!("explanation for {i}")),
        })
        .collect();
    let correct = per_question.iter().filter(|q| q.is_correct).count() as u32;
    let skipped = per_question.iter().filter(|q| q.is_skipped()).count() as u32;

    TestResult {
        summary: ResultSummary {
            total_questions: total,
            correct_answers: correct,
            wrong_answers: total - correct - skipped,
            skipped_questions: skipped,
            percentage: correct as f64 / total as f64 * 100.0,
            score: correct as f64,
            time_taken_minutes: total as f64 * 1.2,
        },
        per_question,
    }
}

fn bench_analyze(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyze");

    for total in [10u32, 100, 200] {
        let result = make_result(total);
        group.bench_function(format!("questions={total}"), |b| {
            b.iter(|| analyze(black_box(&result)))
        });
    }

    group.finish();
}

fn bench_components(c: &mut Criterion) {
    let mut group = c.benchmark_group("components");
    let result = make_result(200);

    group.bench_function("difficulty_breakdown", |b| {
        b.iter(|| difficulty_breakdown(black_box(&result)))
    });

    group.bench_function("grade", |b| {
        b.iter(|| Grade::from_percentage(black_box(72.5)))
    });

    group.finish();
}

criterion_group!(benches, bench_analyze, bench_components);
criterion_main!(benches);
